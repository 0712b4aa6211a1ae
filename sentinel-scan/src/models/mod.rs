//! Data models for sentinel-scan

pub mod image;
pub mod session;

pub use image::{is_image_content_type, EmptyImage, ImageData, ImageSummary};
pub use session::{
    SessionError, SessionSnapshot, SessionState, SessionTransition, GENERIC_ERROR_MESSAGE,
};
