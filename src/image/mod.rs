//! Image types and encoding.

pub mod encoder;
mod types;

pub use encoder::{encode_bytes, encode_file, InlinePayload};
pub use types::{EditMetadata, EditedImage, ImageFormat, SourceImage, DOWNLOAD_FILE_NAME};
