//! Content type detection from leading magic bytes.

use image::ImageFormat;

use mediahub_entity::MediaType;

const WEBM_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// What a blob was detected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub media_type: MediaType,
    pub content_type: &'static str,
    pub extension: &'static str,
}

impl Sniffed {
    /// Whether the image crate can decode this for thumbnails.
    pub fn is_decodable(&self) -> bool {
        matches!(self.media_type, MediaType::Image | MediaType::Gif)
    }
}

/// Detect a supported media type, or `None` if the data is not one.
pub fn sniff(data: &[u8]) -> Option<Sniffed> {
    if let Ok(format) = image::guess_format(data) {
        let (media_type, content_type, extension) = match format {
            ImageFormat::Jpeg => (MediaType::Image, "image/jpeg", "jpeg"),
            ImageFormat::Png => (MediaType::Image, "image/png", "png"),
            ImageFormat::WebP => (MediaType::Image, "image/webp", "webp"),
            ImageFormat::Gif => (MediaType::Gif, "image/gif", "gif"),
            _ => return None,
        };
        return Some(Sniffed {
            media_type,
            content_type,
            extension,
        });
    }

    // ISO base media: a box size followed by "ftyp"
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some(Sniffed {
            media_type: MediaType::Video,
            content_type: "video/mp4",
            extension: "mp4",
        });
    }

    if data.starts_with(&WEBM_MAGIC) {
        return Some(Sniffed {
            media_type: MediaType::Video,
            content_type: "video/webm",
            extension: "webm",
        });
    }

    None
}
