//! Image preparation for upload and relay.

mod format;
mod processor;

use thiserror::Error;

pub use format::{is_animated_url, SourceFormat};
pub use processor::{ImageProcessor, Metadata, ProcessedImage, SourceImage};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported or unrecognized image format")]
    UnknownFormat,
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("image scratch directory I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no upscaler configured")]
    UpscalerMissing,
    #[error("upscaler failed: {0}")]
    Upscale(String),
    #[error("image processor already released")]
    Released,
    #[error("image task failed: {0}")]
    Task(String),
}
