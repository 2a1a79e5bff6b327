//! Processing handle for custom emoji.

use chrono::Utc;
use tokio::sync::{Mutex, OnceCell};

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::types::EmojiId;
use mediahub_entity::{Emoji, ProcessingStatus};

use super::{ProcessingState, StateCell};
use crate::context::MediaContext;
use crate::sniff::sniff;
use crate::types::{AdditionalEmojiInfo, DataFn, PostDataFn};

const SHORTCODE_MIN: usize = 2;
const SHORTCODE_MAX: usize = 30;

type Callbacks = (DataFn, Option<PostDataFn>);

/// An emoji whose image is being (or has been) read and stored.
pub struct ProcessingEmoji {
    ctx: MediaContext,
    initial: Emoji,
    refresh: bool,
    callbacks: Mutex<Option<Callbacks>>,
    state: StateCell,
    outcome: OnceCell<AppResult<Emoji>>,
}

impl std::fmt::Debug for ProcessingEmoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingEmoji")
            .field("emoji_id", &self.initial.id)
            .field("shortcode", &self.initial.shortcode)
            .field("refresh", &self.refresh)
            .field("state", &self.state.get())
            .finish()
    }
}

impl ProcessingEmoji {
    /// Validate an emoji submission and persist its record. An existing emoji
    /// with the same ID is refreshed in place.
    pub(crate) async fn prepare(
        ctx: &MediaContext,
        data: DataFn,
        post_data: Option<PostDataFn>,
        shortcode: &str,
        emoji_id: EmojiId,
        uri: &str,
        info: Option<AdditionalEmojiInfo>,
    ) -> AppResult<Self> {
        validate_shortcode(shortcode)?;
        if uri.trim().is_empty() {
            return Err(AppError::validation("Emoji URI must be set"));
        }
        if emoji_id.is_nil() {
            return Err(AppError::validation("Emoji ID must be set"));
        }

        let existing = ctx.emojis.find_by_id(emoji_id).await?;
        let refresh = existing.is_some();
        let mut emoji = match existing {
            Some(mut emoji) => {
                emoji.shortcode = shortcode.to_string();
                emoji.uri = uri.to_string();
                emoji.processing = ProcessingStatus::Received;
                emoji.updated_at = Utc::now();
                emoji
            }
            None => Emoji::received(emoji_id, shortcode, uri),
        };
        if let Some(info) = info {
            apply_info(&mut emoji, info);
        }

        let taken = ctx
            .emojis
            .find_by_shortcode(&emoji.shortcode, emoji.domain.as_deref())
            .await?;
        if taken.is_some_and(|other| other.id != emoji.id) {
            return Err(AppError::conflict(format!(
                "Emoji :{}: already exists on {}",
                emoji.shortcode,
                emoji.domain.as_deref().unwrap_or("this instance")
            )));
        }

        if refresh {
            ctx.emojis.update(&emoji).await?;
        } else {
            ctx.emojis.create(&emoji).await?;
        }
        tracing::debug!(emoji_id = %emoji.id, shortcode, refresh, "Prepared emoji record");

        Ok(Self {
            ctx: ctx.clone(),
            initial: emoji,
            refresh,
            callbacks: Mutex::new(Some((data, post_data))),
            state: StateCell::new(),
            outcome: OnceCell::new(),
        })
    }

    /// ID of the emoji.
    pub fn emoji_id(&self) -> EmojiId {
        self.initial.id
    }

    /// Shortcode without colons.
    pub fn shortcode(&self) -> &str {
        &self.initial.shortcode
    }

    /// Whether this handle refreshes an emoji that already existed.
    pub fn is_refresh(&self) -> bool {
        self.refresh
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessingState {
        self.state.get()
    }

    /// Whether the handle has an outcome.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Read, store, and record the emoji, or return the cached outcome.
    pub async fn load_emoji(&self) -> AppResult<Emoji> {
        self.outcome
            .get_or_init(|| self.materialize())
            .await
            .clone()
    }

    pub(crate) fn abandon(&self) {
        let cancelled = AppError::cancelled(format!(
            "Processing of emoji :{}: abandoned at shutdown",
            self.initial.shortcode
        ));
        if self.outcome.set(Err(cancelled)).is_ok() {
            self.state.set(ProcessingState::Failed);
        }
    }

    async fn materialize(&self) -> AppResult<Emoji> {
        self.state.set(ProcessingState::Materializing);

        let result = self.store().await;
        match &result {
            Ok(emoji) => {
                self.state.set(ProcessingState::Done);
                tracing::debug!(emoji_id = %emoji.id, shortcode = %emoji.shortcode, "Emoji stored");
            }
            Err(_) => {
                self.state.set(ProcessingState::Failed);
                let mut emoji = self.initial.clone();
                emoji.processing = ProcessingStatus::Error;
                emoji.updated_at = Utc::now();
                if let Err(e) = self.ctx.emojis.update(&emoji).await {
                    tracing::warn!(emoji_id = %emoji.id, "Could not mark emoji as failed: {}", e);
                }
            }
        }
        result
    }

    async fn store(&self) -> AppResult<Emoji> {
        let (data, post_data) = self
            .callbacks
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::internal("Emoji data already consumed"))?;

        let fetched = data().await;
        if let Some(post_data) = post_data {
            if let Err(e) = post_data().await {
                tracing::warn!(emoji_id = %self.initial.id, "Post-data callback failed: {}", e);
            }
        }
        let bytes = fetched?;

        let sniffed = sniff(&bytes).ok_or_else(|| AppError::unsupported_media("unrecognised data"))?;
        if !sniffed.is_decodable() {
            return Err(AppError::unsupported_media(sniffed.content_type));
        }

        let mut emoji = self.initial.clone();
        let size = bytes.len() as u64;
        let limit = if emoji.is_remote() {
            self.ctx.limits.emoji_remote_max_size
        } else {
            self.ctx.limits.emoji_local_max_size
        };
        if size > limit {
            return Err(AppError::too_large(size, limit));
        }

        let rendered = self.ctx.thumbnails.static_png(bytes.clone()).await?;

        let original_path = format!("emoji/original/{}.{}", emoji.id, sniffed.extension);
        let static_path = format!("emoji/static/{}.png", emoji.id);
        self.ctx.storage.write(&original_path, bytes).await?;
        emoji.image_static_file_size = rendered.data.len() as i64;
        self.ctx.storage.write(&static_path, rendered.data).await?;

        emoji.image_path = Some(original_path);
        emoji.image_content_type = Some(sniffed.content_type.to_string());
        emoji.image_file_size = size as i64;
        emoji.image_static_path = Some(static_path);
        emoji.image_static_content_type = Some(rendered.content_type.to_string());
        emoji.processing = ProcessingStatus::Processed;
        emoji.updated_at = Utc::now();
        self.ctx.emojis.update(&emoji).await?;

        Ok(emoji)
    }
}

fn validate_shortcode(shortcode: &str) -> AppResult<()> {
    let len = shortcode.chars().count();
    if !(SHORTCODE_MIN..=SHORTCODE_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "Shortcode must be {} to {} characters",
            SHORTCODE_MIN, SHORTCODE_MAX
        )));
    }
    if !shortcode
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::validation(format!(
            "Shortcode '{}' may only contain letters, numbers, and underscores",
            shortcode
        )));
    }
    Ok(())
}

fn apply_info(emoji: &mut Emoji, info: AdditionalEmojiInfo) {
    if let Some(created_at) = info.created_at {
        emoji.created_at = created_at;
    }
    if info.domain.is_some() {
        emoji.domain = info.domain;
    }
    if info.image_remote_url.is_some() {
        emoji.image_remote_url = info.image_remote_url;
    }
    if info.image_static_remote_url.is_some() {
        emoji.image_static_remote_url = info.image_static_remote_url;
    }
    if let Some(disabled) = info.disabled {
        emoji.disabled = disabled;
    }
    if let Some(visible) = info.visible_in_picker {
        emoji.visible_in_picker = visible;
    }
    if info.category_id.is_some() {
        emoji.category_id = info.category_id;
    }
}
