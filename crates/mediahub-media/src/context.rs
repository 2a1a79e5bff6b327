//! Shared collaborators handed to every processing handle and prune run.

use std::sync::Arc;

use mediahub_core::config::MediaConfig;
use mediahub_core::traits::storage::StorageProvider;
use mediahub_database::{AttachmentRepository, EmojiRepository};
use mediahub_storage::ThumbnailGenerator;

/// Per-kind size limits in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    pub image_max_size: u64,
    pub video_max_size: u64,
    pub emoji_local_max_size: u64,
    pub emoji_remote_max_size: u64,
}

impl From<&MediaConfig> for MediaLimits {
    fn from(config: &MediaConfig) -> Self {
        Self {
            image_max_size: config.image_max_size,
            video_max_size: config.video_max_size,
            emoji_local_max_size: config.emoji_local_max_size,
            emoji_remote_max_size: config.emoji_remote_max_size,
        }
    }
}

/// Metadata stores, blob store, and renderer used by media processing.
///
/// Cloning is cheap; all collaborators are shared.
#[derive(Debug, Clone)]
pub struct MediaContext {
    pub attachments: Arc<dyn AttachmentRepository>,
    pub emojis: Arc<dyn EmojiRepository>,
    pub storage: Arc<dyn StorageProvider>,
    pub thumbnails: ThumbnailGenerator,
    pub limits: MediaLimits,
}

impl MediaContext {
    /// Assemble a context, taking limits and thumbnail bounds from `config`.
    pub fn new(
        attachments: Arc<dyn AttachmentRepository>,
        emojis: Arc<dyn EmojiRepository>,
        storage: Arc<dyn StorageProvider>,
        config: &MediaConfig,
    ) -> Self {
        Self {
            attachments,
            emojis,
            storage,
            thumbnails: ThumbnailGenerator::new(config.thumbnail_max_dimension),
            limits: MediaLimits::from(config),
        }
    }
}
