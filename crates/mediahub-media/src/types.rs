//! Submission payload types.

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use mediahub_core::result::AppResult;
use mediahub_core::types::{EmojiCategoryId, StatusId};

/// One-shot callback producing the raw bytes of a piece of media.
///
/// Invoked by a worker, never on the submitting task.
pub type DataFn = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<Bytes>> + Send>;

/// One-shot callback invoked after [`DataFn`] completes, whether or not it
/// succeeded. Typically releases whatever the data callback was reading from.
pub type PostDataFn = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<()>> + Send>;

/// Box an async closure as a [`DataFn`].
pub fn data_fn<F, Fut>(f: F) -> DataFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<Bytes>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Box an async closure as a [`PostDataFn`].
pub fn post_data_fn<F, Fut>(f: F) -> PostDataFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// A [`DataFn`] yielding bytes already in memory.
pub fn static_data(data: Bytes) -> DataFn {
    data_fn(move || async move { Ok(data) })
}

/// Optional overrides applied to a new attachment record.
#[derive(Debug, Clone, Default)]
pub struct AdditionalMediaInfo {
    /// Creation time, e.g. the time a remote status was published.
    pub created_at: Option<DateTime<Utc>>,
    /// Status the attachment belongs to.
    pub status_id: Option<StatusId>,
    /// Origin URL, set for media fetched from another server.
    pub remote_url: Option<String>,
    /// Alt text.
    pub description: Option<String>,
    /// Blurhash supplied by the origin.
    pub blurhash: Option<String>,
    /// Whether this is an account avatar.
    pub avatar: Option<bool>,
    /// Whether this is an account header image.
    pub header: Option<bool>,
    /// Horizontal focal point in `[-1.0, 1.0]`.
    pub focus_x: Option<f32>,
    /// Vertical focal point in `[-1.0, 1.0]`.
    pub focus_y: Option<f32>,
}

/// Optional overrides applied to a new or refreshed emoji record.
#[derive(Debug, Clone, Default)]
pub struct AdditionalEmojiInfo {
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Origin domain for remote emoji.
    pub domain: Option<String>,
    /// Remote URL of the original image.
    pub image_remote_url: Option<String>,
    /// Remote URL of the static image.
    pub image_static_remote_url: Option<String>,
    /// Whether the emoji is disabled.
    pub disabled: Option<bool>,
    /// Whether the emoji shows up in the picker.
    pub visible_in_picker: Option<bool>,
    /// Picker category.
    pub category_id: Option<EmojiCategoryId>,
}
