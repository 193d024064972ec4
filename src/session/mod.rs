//! Edit session state and its async driver.

mod editor;
mod history;
mod machine;
mod snapshot;

pub use editor::Editor;
pub use history::{PromptHistory, HISTORY_LIMIT};
pub use machine::{Completion, Phase, Session, Submission};
pub use snapshot::{ImageSummary, SessionSnapshot};
