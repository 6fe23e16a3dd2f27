//! Turns uploaded image files into self-contained data URLs stored with the listing.
// region:    --- Imports
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auction::model::MAX_IMAGES;
use crate::error::{AuctionError, Result};

// endregion: --- Imports

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// `data:<mime>;base64,<payload>`
pub fn encode_image(upload: &ImageUpload) -> Result<String> {
    let mime = upload.content_type.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") || mime.len() == "image/".len() {
        return Err(AuctionError::InvalidInput(format!(
            "unsupported image type: {}",
            upload.content_type
        )));
    }
    if upload.bytes.is_empty() {
        return Err(AuctionError::InvalidInput("empty image file".to_string()));
    }
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&upload.bytes)))
}

/// Encodes a whole upload batch, keeping the order, bounded to [`MAX_IMAGES`].
pub fn encode_images(uploads: &[ImageUpload]) -> Result<Vec<String>> {
    if uploads.len() > MAX_IMAGES {
        return Err(AuctionError::InvalidInput(format!(
            "you can upload a maximum of {} images",
            MAX_IMAGES
        )));
    }
    uploads.iter().map(encode_image).collect()
}

// endregion: --- Tests
