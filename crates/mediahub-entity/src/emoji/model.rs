//! Custom emoji entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mediahub_core::types::{EmojiCategoryId, EmojiId};

use crate::attachment::ProcessingStatus;

/// A custom emoji, either uploaded locally or learned from a remote server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Emoji {
    /// Unique emoji identifier.
    pub id: EmojiId,
    /// Shortcode without the surrounding colons.
    pub shortcode: String,
    /// Origin domain, `None` for local emoji.
    pub domain: Option<String>,
    /// ActivityPub URI of the emoji.
    pub uri: String,
    /// Remote URL of the original image.
    pub image_remote_url: Option<String>,
    /// Remote URL of the static image.
    pub image_static_remote_url: Option<String>,
    /// Storage key of the original image.
    pub image_path: Option<String>,
    /// Storage key of the static PNG rendition.
    pub image_static_path: Option<String>,
    /// MIME type of the original image.
    pub image_content_type: Option<String>,
    /// MIME type of the static rendition.
    pub image_static_content_type: Option<String>,
    /// Size of the original image in bytes.
    pub image_file_size: i64,
    /// Size of the static rendition in bytes.
    pub image_static_file_size: i64,
    /// Processing lifecycle status.
    pub processing: ProcessingStatus,
    /// Whether the emoji has been disabled by an admin.
    pub disabled: bool,
    /// Whether the emoji shows up in the picker.
    pub visible_in_picker: bool,
    /// Picker category.
    pub category_id: Option<EmojiCategoryId>,
    /// When the emoji was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Emoji {
    /// Create a freshly received local emoji record with nothing stored yet.
    pub fn received(id: EmojiId, shortcode: impl Into<String>, uri: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            shortcode: shortcode.into(),
            domain: None,
            uri: uri.into(),
            image_remote_url: None,
            image_static_remote_url: None,
            image_path: None,
            image_static_path: None,
            image_content_type: None,
            image_static_content_type: None,
            image_file_size: 0,
            image_static_file_size: 0,
            processing: ProcessingStatus::Received,
            disabled: false,
            visible_in_picker: true,
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the emoji was learned from another server.
    pub fn is_remote(&self) -> bool {
        self.domain.is_some()
    }
}
