#![warn(missing_docs)]
//! GenEdit - prompt-driven image editing.
//!
//! Upload an image, describe the change in plain language, and get the edited
//! image back from a Gemini image model. A [`Session`] tracks the current
//! image, prompt, result, error and a short history of prompts that worked;
//! an [`Editor`] drives it against an [`EditClient`].
//!
//! # Quick Start
//!
//! ```no_run
//! use genedit::{EditConfig, Editor, GeminiEditClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genedit::Result<()> {
//!     let config = EditConfig::from_env()?;
//!     let mut editor = Editor::new(Arc::new(GeminiEditClient::new(config)));
//!
//!     editor.upload_file("cat.png").await?;
//!     editor.set_prompt_text("add a hat");
//!     editor.submit_and_wait().await?;
//!
//!     if let Some(image) = editor.session().current_result() {
//!         image.save(genedit::DOWNLOAD_FILE_NAME)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
mod error;
pub mod image;
pub mod session;

pub use client::{EditClient, GeminiEditClient, GeminiModel};
pub use config::EditConfig;
pub use error::{
    EditError, ErrorKind, Result, READ_FAILURE_MESSAGE, REMOTE_FAILURE_MESSAGE,
    VALIDATION_MESSAGE,
};
pub use image::{
    encode_bytes, encode_file, EditMetadata, EditedImage, ImageFormat, SourceImage,
    DOWNLOAD_FILE_NAME,
};
pub use session::{
    Completion, Editor, Phase, PromptHistory, Session, SessionSnapshot, HISTORY_LIMIT,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{EditClient, GeminiEditClient};
    pub use crate::config::EditConfig;
    pub use crate::error::{EditError, Result};
    pub use crate::image::{EditedImage, SourceImage};
    pub use crate::session::{Editor, Phase, Session};
}
