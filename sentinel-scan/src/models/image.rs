//! Uploaded image payload
//!
//! Holds the raw bytes of the photograph together with its media type, and
//! produces the base64 form embedded in inference requests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Media type assumed when neither the bytes nor the upload identify one
pub const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

/// Image payload was empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("image payload is empty")]
pub struct EmptyImage;

/// Still photograph held by the session
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Vec<u8>,
    media_type: String,
}

/// Size and type of the held image, without its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub media_type: String,
    pub size_bytes: usize,
}

impl ImageData {
    /// Wrap uploaded bytes
    ///
    /// The media type is sniffed from the magic number first; the declared
    /// type is used when sniffing finds nothing image-like.
    pub fn new(bytes: Vec<u8>, declared_type: Option<&str>) -> Result<Self, EmptyImage> {
        if bytes.is_empty() {
            return Err(EmptyImage);
        }
        let media_type = detect_media_type(&bytes, declared_type);
        Ok(Self { bytes, media_type })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty payloads are rejected at construction
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard padded base64 of the bytes
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            media_type: self.media_type.clone(),
            size_bytes: self.bytes.len(),
        }
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// True for `image/*` content types, ignoring parameters and case
pub fn is_image_content_type(content_type: &str) -> bool {
    essence(content_type).starts_with("image/")
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn detect_media_type(bytes: &[u8], declared_type: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() == infer::MatcherType::Image {
            return kind.mime_type().to_string();
        }
    }

    declared_type
        .filter(|t| is_image_content_type(t))
        .map(essence)
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string())
}
