//! Thumbnail and static rendition generation.

pub mod generator;

pub use generator::{RenderedImage, ThumbnailGenerator, Thumbnailed};
