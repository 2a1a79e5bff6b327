//! Image decoding, thumbnailing, and re-encoding.
//!
//! Decoding is CPU bound, so every entry point runs on the blocking pool.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;

/// An encoded image together with its pixel dimensions.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Encoded image bytes.
    pub data: Bytes,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// MIME type of `data`.
    pub content_type: &'static str,
}

/// Result of thumbnailing a source image.
#[derive(Debug, Clone)]
pub struct Thumbnailed {
    /// Width of the decoded source.
    pub source_width: u32,
    /// Height of the decoded source.
    pub source_height: u32,
    /// JPEG thumbnail bounded by the generator's maximum dimension.
    pub thumbnail: RenderedImage,
}

/// Renders thumbnails and static renditions of still or animated images.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailGenerator {
    max_dimension: u32,
}

impl ThumbnailGenerator {
    /// Create a generator whose thumbnails fit in a `max_dimension` square.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode `source` (first frame for animations) and produce a JPEG
    /// thumbnail. Images already within bounds are not upscaled.
    pub async fn jpeg_thumbnail(&self, source: Bytes) -> AppResult<Thumbnailed> {
        let max = self.max_dimension;
        run_blocking(move || {
            let image = decode(&source)?;
            let (source_width, source_height) = (image.width(), image.height());

            let resized = if source_width > max || source_height > max {
                image.thumbnail(max, max)
            } else {
                image
            };
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
            let thumbnail = encode(&rgb, ImageFormat::Jpeg, "image/jpeg")?;

            Ok(Thumbnailed {
                source_width,
                source_height,
                thumbnail,
            })
        })
        .await
    }

    /// Decode `source` (first frame for animations) and re-encode it as PNG
    /// at full size.
    pub async fn static_png(&self, source: Bytes) -> AppResult<RenderedImage> {
        run_blocking(move || {
            let image = decode(&source)?;
            encode(&image, ImageFormat::Png, "image/png")
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Image task panicked", e))?
}

fn decode(data: &[u8]) -> AppResult<DynamicImage> {
    if data.is_empty() {
        return Err(AppError::processing("Empty image data"));
    }
    image::load_from_memory(data)
        .map_err(|e| AppError::with_source(ErrorKind::Processing, "Failed to decode image", e))
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    content_type: &'static str,
) -> AppResult<RenderedImage> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| AppError::with_source(ErrorKind::Processing, "Failed to encode image", e))?;

    Ok(RenderedImage {
        data: Bytes::from(buf),
        width: image.width(),
        height: image.height(),
        content_type,
    })
}
