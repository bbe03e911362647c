use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use super::format::{is_animated_url, SourceFormat};
use super::ImageError;
use crate::constants::{MAX_IMAGE_WIDTH, RESIZED_WIDTH};

/// Prefix of every processor's scratch directory.
const TEMP_PREFIX: &str = "webpEncoded-";

/// Intrinsic size of a decoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub width: u32,
    pub height: u32,
}

/// Raw source bytes with lazily read, cached metadata.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    format: SourceFormat,
    metadata: Option<Metadata>,
}

impl SourceImage {
    /// # Errors
    ///
    /// Returns [`ImageError::UnknownFormat`] when the bytes are not a supported image.
    pub fn new(bytes: Vec<u8>) -> Result<Self, ImageError> {
        let format = SourceFormat::sniff(&bytes).ok_or(ImageError::UnknownFormat)?;
        Ok(Self {
            bytes,
            format,
            metadata: None,
        })
    }

    #[must_use]
    pub const fn format(&self) -> SourceFormat {
        self.format
    }

    /// Read the header once; later calls return the cached value.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be decoded.
    pub fn metadata(&mut self) -> Result<Metadata, ImageError> {
        if let Some(metadata) = self.metadata {
            return Ok(metadata);
        }
        let (width, height) =
            image::ImageReader::with_format(Cursor::new(&self.bytes), self.format.codec())
                .into_dimensions()
                .map_err(ImageError::Decode)?;
        let metadata = Metadata { width, height };
        self.metadata = Some(metadata);
        Ok(metadata)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encoded output ready for upload or relay.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    /// File extension matching [`Self::mime`].
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime {
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/png" => "png",
            _ => "jpg",
        }
    }
}

/// Upscale, resize and compress images inside a private scratch directory.
///
/// The scratch directory is owned by the processor. Call [`release`] on every
/// exit path; dropping an unreleased processor also removes it, but any error
/// is lost.
///
/// [`release`]: ImageProcessor::release
pub struct ImageProcessor {
    dir: Option<TempDir>,
    quality: u8,
    upscaler: Option<PathBuf>,
    sequence: u32,
}

impl ImageProcessor {
    /// Allocate a uniquely named scratch directory under `parent` (or the
    /// system temp directory).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(
        parent: Option<&Path>,
        quality: u8,
        upscaler: Option<PathBuf>,
    ) -> Result<Self, ImageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Allocated image scratch directory");

        Ok(Self {
            dir: Some(dir),
            quality: quality.clamp(1, 100),
            upscaler,
            sequence: 0,
        })
    }

    /// Scratch directory path.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Released`] after [`Self::release`].
    pub fn path(&self) -> Result<&Path, ImageError> {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .ok_or(ImageError::Released)
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Delete the scratch directory. Releasing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory could not be removed.
    pub fn release(&mut self) -> Result<(), ImageError> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!(path = %path.display(), "Released image scratch directory");
        }
        Ok(())
    }

    /// Process one source image.
    ///
    /// Animated sources (GIF bytes or a `.gif` URL) are returned untouched.
    /// Otherwise the image is optionally upscaled, downsized when wider than
    /// the ceiling, and re-encoded: lossless WebP at quality 100, JPEG below.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown formats, decode/encode failures, or a
    /// released processor. Upscale failures are logged and skipped.
    pub async fn process(
        &mut self,
        bytes: Vec<u8>,
        source_url: &str,
        upscale: bool,
    ) -> Result<ProcessedImage, ImageError> {
        self.path()?;
        let mut source = SourceImage::new(bytes)?;

        if source.format().is_animated() || is_animated_url(source_url) {
            let Metadata { width, height } = source.metadata().unwrap_or(Metadata {
                width: 0,
                height: 0,
            });
            debug!(url = %source_url, "Animated source, passing through");
            return Ok(ProcessedImage {
                mime: source.format().mime(),
                bytes: source.into_bytes(),
                width,
                height,
            });
        }

        if upscale {
            match self.upscale(&source).await {
                Ok(upscaled) => source = SourceImage::new(upscaled)?,
                Err(e) => warn!(url = %source_url, error = %e, "Upscale skipped"),
            }
        }

        let metadata = source.metadata()?;
        let quality = self.quality;
        tokio::task::spawn_blocking(move || transcode(&source, metadata, quality))
            .await
            .map_err(|e| ImageError::Task(e.to_string()))?
    }

    async fn upscale(&mut self, source: &SourceImage) -> Result<Vec<u8>, ImageError> {
        let exe = self.upscaler.clone().ok_or(ImageError::UpscalerMissing)?;
        self.sequence += 1;
        let sequence = self.sequence;
        let dir = self.path()?;

        let input = dir.join(format!("source-{sequence}"));
        let output = dir.join(format!("upscaled-{sequence}.png"));
        tokio::fs::write(&input, &source.bytes).await?;

        debug!(exe = %exe.display(), input = %input.display(), "Running upscaler");
        let result = Command::new(&exe)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?
            .wait_with_output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ImageError::Upscale(stderr.trim().to_string()));
        }

        Ok(tokio::fs::read(&output).await?)
    }
}

impl Drop for ImageProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to release image scratch directory");
        }
    }
}

fn transcode(
    source: &SourceImage,
    metadata: Metadata,
    quality: u8,
) -> Result<ProcessedImage, ImageError> {
    let mut image = image::load_from_memory_with_format(&source.bytes, source.format().codec())
        .map_err(ImageError::Decode)?;

    if metadata.width > MAX_IMAGE_WIDTH {
        let height = (u64::from(metadata.height) * u64::from(RESIZED_WIDTH)
            / u64::from(metadata.width))
        .max(1) as u32;
        debug!(
            from = metadata.width,
            to = RESIZED_WIDTH,
            "Downsizing oversized image"
        );
        image = image.resize_exact(RESIZED_WIDTH, height, FilterType::Lanczos3);
    }

    encode(&image, quality)
}

fn encode(image: &DynamicImage, quality: u8) -> Result<ProcessedImage, ImageError> {
    let mut bytes = Vec::new();
    let mime = if quality >= 100 {
        DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut bytes))
            .map_err(ImageError::Encode)?;
        "image/webp"
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
            .map_err(ImageError::Encode)?;
        "image/jpeg"
    };

    Ok(ProcessedImage {
        bytes,
        mime,
        width: image.width(),
        height: image.height(),
    })
}
