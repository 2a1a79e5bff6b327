//! Media attachment entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mediahub_core::types::{AccountId, AttachmentId, StatusId};

use super::kind::{MediaType, ProcessingStatus};

/// A photo, video, or animated image attached to a status or profile.
///
/// Remote attachments carry a `remote_url`. Their local blobs may be pruned,
/// which flips `cached` to false while leaving the row in place so the media
/// can be fetched again on demand.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaAttachment {
    /// Unique attachment identifier.
    pub id: AttachmentId,
    /// Account that owns the attachment.
    pub account_id: AccountId,
    /// Status the attachment is attached to, if any.
    pub status_id: Option<StatusId>,
    /// Origin URL for attachments fetched from another server.
    pub remote_url: Option<String>,
    /// Content category.
    pub media_type: MediaType,
    /// Processing lifecycle status.
    pub processing: ProcessingStatus,
    /// Whether the original and thumbnail blobs are currently stored.
    pub cached: bool,
    /// Storage key of the original file.
    pub file_path: Option<String>,
    /// MIME type of the original file.
    pub file_content_type: Option<String>,
    /// Size of the original file in bytes.
    pub file_size: i64,
    /// Storage key of the thumbnail.
    pub thumbnail_path: Option<String>,
    /// MIME type of the thumbnail.
    pub thumbnail_content_type: Option<String>,
    /// Size of the thumbnail in bytes.
    pub thumbnail_size: i64,
    /// Width in pixels of the original, when known.
    pub width: Option<i32>,
    /// Height in pixels of the original, when known.
    pub height: Option<i32>,
    /// Alt text.
    pub description: Option<String>,
    /// Blurhash placeholder supplied by the origin.
    pub blurhash: Option<String>,
    /// Horizontal focal point in `[-1.0, 1.0]`.
    pub focus_x: f32,
    /// Vertical focal point in `[-1.0, 1.0]`.
    pub focus_y: f32,
    /// Whether this is an account avatar.
    pub avatar: bool,
    /// Whether this is an account header image.
    pub header: bool,
    /// When the attachment was created (or first seen, for remote media).
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl MediaAttachment {
    /// Create a freshly received attachment record with nothing stored yet.
    pub fn received(id: AttachmentId, account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_id,
            status_id: None,
            remote_url: None,
            media_type: MediaType::Unknown,
            processing: ProcessingStatus::Received,
            cached: false,
            file_path: None,
            file_content_type: None,
            file_size: 0,
            thumbnail_path: None,
            thumbnail_content_type: None,
            thumbnail_size: 0,
            width: None,
            height: None,
            description: None,
            blurhash: None,
            focus_x: 0.0,
            focus_y: 0.0,
            avatar: false,
            header: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the attachment originated on another server.
    pub fn is_remote(&self) -> bool {
        self.remote_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Storage keys of every blob this attachment currently references.
    pub fn blob_paths(&self) -> impl Iterator<Item = &str> {
        self.file_path
            .as_deref()
            .into_iter()
            .chain(self.thumbnail_path.as_deref())
    }
}
