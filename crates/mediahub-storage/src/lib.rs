//! # mediahub-storage
//!
//! Local filesystem blob storage and image rendering (thumbnails and static
//! emoji renditions) for MediaHub.

pub mod providers;
pub mod thumbnail;

pub use providers::LocalStorageProvider;
pub use thumbnail::{RenderedImage, ThumbnailGenerator, Thumbnailed};
