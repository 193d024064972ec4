//! Render-ready view of a session.

use crate::image::{EditedImage, ImageFormat};
use crate::session::machine::{Phase, Session};
use serde::Serialize;

/// Summary of an image held by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    /// Media type.
    pub media_type: ImageFormat,
    /// Size in bytes.
    pub size_bytes: usize,
}

/// Everything a front end needs to draw the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Derived phase.
    pub phase: Phase,
    /// Generation tag at capture time.
    pub generation: u64,
    /// Source image, if uploaded.
    pub image: Option<ImageSummary>,
    /// Renderable `data:` URI of the source image.
    pub preview: Option<String>,
    /// Edited image, if the last edit succeeded.
    pub result: Option<ImageSummary>,
    /// Renderable `data:` URI of the edited image.
    pub result_preview: Option<String>,
    /// True when an edited image is available for download.
    pub has_result: bool,
    /// Prompt text as typed.
    pub prompt_text: String,
    /// True while an edit request is outstanding.
    pub is_request_in_flight: bool,
    /// Displayable message for the last failure.
    pub last_error: Option<String>,
    /// Successful prompts, most recent first.
    pub history: Vec<String>,
}

impl SessionSnapshot {
    /// Captures the current state of `session`.
    pub fn of(session: &Session) -> Self {
        Self {
            phase: session.phase(),
            generation: session.generation(),
            image: session.current_image().map(|image| ImageSummary {
                media_type: image.media_type(),
                size_bytes: image.size(),
            }),
            preview: session.current_image().map(|image| image.preview().to_string()),
            result: session.current_result().map(|image| ImageSummary {
                media_type: image.format,
                size_bytes: image.size(),
            }),
            result_preview: session.current_result().map(EditedImage::to_data_url),
            has_result: session.current_result().is_some(),
            prompt_text: session.prompt_text().to_string(),
            is_request_in_flight: session.is_request_in_flight(),
            last_error: session.last_error().map(str::to_string),
            history: session.history().entries().to_vec(),
        }
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::of(&Session::new())
    }
}
