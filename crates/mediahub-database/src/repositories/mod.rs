//! Repository traits for media metadata and their implementations.
//!
//! The media manager only sees the traits, so it runs unchanged against
//! Postgres in production and the in-memory store in tests.

pub mod attachment;
pub mod emoji;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use mediahub_core::result::AppResult;
use mediahub_core::types::{AttachmentId, EmojiId};
use mediahub_entity::{Emoji, MediaAttachment};

pub use attachment::PgAttachmentRepository;
pub use emoji::PgEmojiRepository;
pub use memory::MemoryMediaRepository;

/// Counts of remote attachments by cache state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemoteCacheStats {
    /// Remote attachments whose blobs are stored locally.
    pub cached: u64,
    /// Remote attachments that have been pruned or never fetched.
    pub uncached: u64,
}

/// Persistence for [`MediaAttachment`] rows.
#[async_trait]
pub trait AttachmentRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new attachment. Fails with a conflict if the ID exists.
    async fn create(&self, attachment: &MediaAttachment) -> AppResult<()>;

    /// Overwrite an existing attachment. Fails with not-found if missing.
    async fn update(&self, attachment: &MediaAttachment) -> AppResult<()>;

    /// Find an attachment by ID.
    async fn find_by_id(&self, id: AttachmentId) -> AppResult<Option<MediaAttachment>>;

    /// Cached remote attachments created strictly before `older_than`,
    /// newest first, at most `limit` rows.
    async fn find_cached_remote_older_than(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<MediaAttachment>>;

    /// Count remote attachments by cache state.
    async fn remote_cache_stats(&self) -> AppResult<RemoteCacheStats>;
}

/// Persistence for [`Emoji`] rows.
#[async_trait]
pub trait EmojiRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new emoji. Fails with a conflict if the ID, URI, or
    /// shortcode/domain pair exists.
    async fn create(&self, emoji: &Emoji) -> AppResult<()>;

    /// Overwrite an existing emoji. Fails with not-found if missing.
    async fn update(&self, emoji: &Emoji) -> AppResult<()>;

    /// Find an emoji by ID.
    async fn find_by_id(&self, id: EmojiId) -> AppResult<Option<Emoji>>;

    /// Find an emoji by shortcode and domain (`None` for local emoji).
    async fn find_by_shortcode(
        &self,
        shortcode: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<Emoji>>;
}
