//! In-memory repository using dashmap, for tests and local development.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::types::{AttachmentId, EmojiId};
use mediahub_entity::{Emoji, MediaAttachment};

use super::{AttachmentRepository, EmojiRepository, RemoteCacheStats};

/// Attachment and emoji repository held entirely in memory.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaRepository {
    attachments: Arc<DashMap<AttachmentId, MediaAttachment>>,
    emojis: Arc<DashMap<EmojiId, Emoji>>,
}

impl MemoryMediaRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored attachments.
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}

#[async_trait]
impl AttachmentRepository for MemoryMediaRepository {
    async fn create(&self, attachment: &MediaAttachment) -> AppResult<()> {
        match self.attachments.entry(attachment.id) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Attachment {} already exists",
                attachment.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(attachment.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, attachment: &MediaAttachment) -> AppResult<()> {
        match self.attachments.get_mut(&attachment.id) {
            Some(mut existing) => {
                *existing = attachment.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Attachment {} not found",
                attachment.id
            ))),
        }
    }

    async fn find_by_id(&self, id: AttachmentId) -> AppResult<Option<MediaAttachment>> {
        Ok(self.attachments.get(&id).map(|a| a.clone()))
    }

    async fn find_cached_remote_older_than(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<MediaAttachment>> {
        let mut matches: Vec<MediaAttachment> = self
            .attachments
            .iter()
            .filter(|a| a.cached && a.is_remote() && a.created_at < older_than)
            .map(|a| a.clone())
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn remote_cache_stats(&self) -> AppResult<RemoteCacheStats> {
        let mut stats = RemoteCacheStats::default();
        for attachment in self.attachments.iter().filter(|a| a.is_remote()) {
            if attachment.cached {
                stats.cached += 1;
            } else {
                stats.uncached += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl EmojiRepository for MemoryMediaRepository {
    async fn create(&self, emoji: &Emoji) -> AppResult<()> {
        let duplicate = self.emojis.iter().any(|e| {
            e.uri == emoji.uri || (e.shortcode == emoji.shortcode && e.domain == emoji.domain)
        });
        if duplicate {
            return Err(AppError::conflict(format!(
                "Emoji :{}: already exists",
                emoji.shortcode
            )));
        }
        match self.emojis.entry(emoji.id) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Emoji {} already exists",
                emoji.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(emoji.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, emoji: &Emoji) -> AppResult<()> {
        match self.emojis.get_mut(&emoji.id) {
            Some(mut existing) => {
                *existing = emoji.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Emoji {} not found", emoji.id))),
        }
    }

    async fn find_by_id(&self, id: EmojiId) -> AppResult<Option<Emoji>> {
        Ok(self.emojis.get(&id).map(|e| e.clone()))
    }

    async fn find_by_shortcode(
        &self,
        shortcode: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<Emoji>> {
        Ok(self
            .emojis
            .iter()
            .find(|e| e.shortcode == shortcode && e.domain.as_deref() == domain)
            .map(|e| e.clone()))
    }
}
