//! Remote edit clients.

mod gemini;

pub use gemini::{GeminiEditClient, GeminiModel};

use crate::error::Result;
use crate::image::{EditedImage, SourceImage};
use async_trait::async_trait;

/// A service that applies a natural-language edit to an image.
///
/// Implementations make exactly one attempt per call and never touch session
/// state; the caller decides what to do with the outcome.
#[async_trait]
pub trait EditClient: Send + Sync {
    /// Sends `image` and the (already trimmed) `prompt` and returns the edited image.
    async fn edit(&self, image: &SourceImage, prompt: &str) -> Result<EditedImage>;

    /// Returns the name of this client for display.
    fn name(&self) -> &str;
}
