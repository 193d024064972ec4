//! Core image types shared by the encoder, the edit client and the session.

use crate::error::{EditError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name offered for downloading an edited image.
pub const DOWNLOAD_FILE_NAME: &str = "edited-image.png";

/// Supported image container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// GIF format.
    Gif,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a declared media type. Parameters (`;charset=...`) are ignored.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    ///
    /// Only used to label returned images whose declared type we do not
    /// recognize; uploads always trust their declared type.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

fn data_url(format: ImageFormat, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// An image chosen by the user as the input of an edit.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    data: Vec<u8>,
    media_type: ImageFormat,
    preview: String,
}

impl SourceImage {
    pub(crate) fn new(data: Vec<u8>, media_type: ImageFormat) -> Self {
        let preview = data_url(media_type, &data);
        Self {
            data,
            media_type,
            preview,
        }
    }

    /// Raw image bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared media type.
    pub fn media_type(&self) -> ImageFormat {
        self.media_type
    }

    /// Renderable preview (`data:` URI).
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Size of the raw image in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Metadata about a completed edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMetadata {
    /// Model that produced the image.
    pub model: Option<String>,
    /// Round-trip duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// An edited image returned by the service.
#[derive(Clone, PartialEq, Eq)]
#[must_use = "edited image should be saved or displayed"]
pub struct EditedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Edit metadata.
    pub metadata: EditMetadata,
}

impl EditedImage {
    /// Creates a new edited image.
    pub fn new(data: Vec<u8>, format: ImageFormat, metadata: EditMetadata) -> Self {
        Self {
            data,
            format,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data).map_err(EditError::Io)
    }

    /// Returns the image as a data URL for display.
    pub fn to_data_url(&self) -> String {
        data_url(self.format, &self.data)
    }
}

impl std::fmt::Debug for EditedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditedImage")
            .field("format", &self.format)
            .field("size", &self.data.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}
