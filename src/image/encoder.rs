//! Turns user-supplied image files into transport-ready payloads.
//!
//! The declared media type is trusted as-is; file contents are never sniffed.

use crate::error::{EditError, Result};
use crate::image::types::{ImageFormat, SourceImage};
use base64::Engine;
use serde::Serialize;
use std::path::Path;

/// Builds a [`SourceImage`] from bytes and the media type reported for them.
pub fn encode_bytes(data: Vec<u8>, media_type: &str) -> Result<SourceImage> {
    let format = ImageFormat::from_mime_type(media_type)
        .ok_or_else(|| EditError::UnsupportedMediaType(media_type.to_string()))?;
    Ok(SourceImage::new(data, format))
}

/// Reads an image file, declaring its type from the file extension.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<SourceImage> {
    let path = path.as_ref();
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| EditError::UnsupportedMediaType(path.display().to_string()))?;

    let data = tokio::fs::read(path).await.map_err(EditError::Read)?;
    tracing::debug!(path = %path.display(), size = data.len(), %format, "encoded source image");
    Ok(SourceImage::new(data, format))
}

/// Base64 inline payload as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePayload {
    /// Declared media type.
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl From<&SourceImage> for InlinePayload {
    fn from(image: &SourceImage) -> Self {
        Self {
            mime_type: image.media_type().mime_type().to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(image.data()),
        }
    }
}
