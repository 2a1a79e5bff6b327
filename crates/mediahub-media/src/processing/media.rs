//! Processing handle for media attachments.

use chrono::Utc;
use tokio::sync::{Mutex, OnceCell};

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::types::{AccountId, AttachmentId};
use mediahub_entity::{MediaAttachment, MediaType, ProcessingStatus};

use super::{ProcessingState, StateCell, valid_focus};
use crate::context::MediaContext;
use crate::sniff::sniff;
use crate::types::{AdditionalMediaInfo, DataFn, PostDataFn};

type Callbacks = (DataFn, Option<PostDataFn>);

/// An attachment whose data is being (or has been) read and stored.
pub struct ProcessingMedia {
    ctx: MediaContext,
    initial: MediaAttachment,
    recache: bool,
    callbacks: Mutex<Option<Callbacks>>,
    state: StateCell,
    outcome: OnceCell<AppResult<MediaAttachment>>,
}

impl std::fmt::Debug for ProcessingMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingMedia")
            .field("attachment_id", &self.initial.id)
            .field("recache", &self.recache)
            .field("state", &self.state.get())
            .finish()
    }
}

impl ProcessingMedia {
    /// Validate a new attachment submission and persist its initial record.
    pub(crate) async fn prepare(
        ctx: &MediaContext,
        data: DataFn,
        post_data: Option<PostDataFn>,
        account_id: AccountId,
        info: Option<AdditionalMediaInfo>,
    ) -> AppResult<Self> {
        if account_id.is_nil() {
            return Err(AppError::validation("Account ID must be set"));
        }

        let mut attachment = MediaAttachment::received(AttachmentId::new(), account_id);
        if let Some(info) = info {
            apply_info(&mut attachment, info)?;
        }

        ctx.attachments.create(&attachment).await?;
        tracing::debug!(
            attachment_id = %attachment.id,
            account_id = %account_id,
            "Created attachment record"
        );

        Ok(Self::new(ctx.clone(), attachment, data, post_data, false))
    }

    /// Look up an existing attachment whose blobs should be fetched again.
    pub(crate) async fn prepare_recache(
        ctx: &MediaContext,
        data: DataFn,
        post_data: Option<PostDataFn>,
        attachment_id: AttachmentId,
    ) -> AppResult<Self> {
        let attachment = ctx
            .attachments
            .find_by_id(attachment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Attachment {} not found", attachment_id)))?;

        Ok(Self::new(ctx.clone(), attachment, data, post_data, true))
    }

    fn new(
        ctx: MediaContext,
        initial: MediaAttachment,
        data: DataFn,
        post_data: Option<PostDataFn>,
        recache: bool,
    ) -> Self {
        Self {
            ctx,
            initial,
            recache,
            callbacks: Mutex::new(Some((data, post_data))),
            state: StateCell::new(),
            outcome: OnceCell::new(),
        }
    }

    /// ID of the attachment, assigned before the handle was returned.
    pub fn attachment_id(&self) -> AttachmentId {
        self.initial.id
    }

    /// Whether this handle re-fetches an existing attachment.
    pub fn is_recache(&self) -> bool {
        self.recache
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessingState {
        self.state.get()
    }

    /// Whether the handle has an outcome.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Read, store, and record the attachment, or return the outcome of the
    /// load that already did. Concurrent callers wait for the first.
    pub async fn load_attachment(&self) -> AppResult<MediaAttachment> {
        self.outcome
            .get_or_init(|| self.materialize())
            .await
            .clone()
    }

    /// Fail the handle without running it. No effect once a load has begun.
    pub(crate) fn abandon(&self) {
        let cancelled = AppError::cancelled(format!(
            "Processing of attachment {} abandoned at shutdown",
            self.initial.id
        ));
        if self.outcome.set(Err(cancelled)).is_ok() {
            self.state.set(ProcessingState::Failed);
        }
    }

    async fn materialize(&self) -> AppResult<MediaAttachment> {
        self.state.set(ProcessingState::Materializing);

        match self.store().await {
            Ok(attachment) => {
                self.state.set(ProcessingState::Done);
                tracing::debug!(
                    attachment_id = %attachment.id,
                    media_type = %attachment.media_type,
                    recache = self.recache,
                    "Attachment stored"
                );
                Ok(attachment)
            }
            Err(e) => {
                self.state.set(ProcessingState::Failed);
                self.record_failure().await;
                Err(e)
            }
        }
    }

    async fn store(&self) -> AppResult<MediaAttachment> {
        let (data, post_data) = self
            .callbacks
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::internal("Attachment data already consumed"))?;

        let mut attachment = self.initial.clone();
        attachment.processing = ProcessingStatus::Processing;
        attachment.updated_at = Utc::now();
        self.ctx.attachments.update(&attachment).await?;

        let fetched = data().await;
        if let Some(post_data) = post_data {
            if let Err(e) = post_data().await {
                tracing::warn!(attachment_id = %attachment.id, "Post-data callback failed: {}", e);
            }
        }
        let bytes = fetched?;

        let sniffed = sniff(&bytes).ok_or_else(|| AppError::unsupported_media("unrecognised data"))?;
        let size = bytes.len() as u64;
        let limit = match sniffed.media_type {
            MediaType::Video => self.ctx.limits.video_max_size,
            _ => self.ctx.limits.image_max_size,
        };
        if size > limit {
            return Err(AppError::too_large(size, limit));
        }

        // Decode before writing anything so corrupt images leave no blobs.
        let thumbnail = if sniffed.is_decodable() {
            Some(self.ctx.thumbnails.jpeg_thumbnail(bytes.clone()).await?)
        } else {
            None
        };

        let owner = attachment.account_id;
        let id = attachment.id;

        let original_path = format!("{}/attachment/original/{}.{}", owner, id, sniffed.extension);
        self.ctx.storage.write(&original_path, bytes).await?;
        attachment.media_type = sniffed.media_type;
        attachment.file_path = Some(original_path);
        attachment.file_content_type = Some(sniffed.content_type.to_string());
        attachment.file_size = size as i64;

        if let Some(thumbnailed) = thumbnail {
            let small_path = format!("{}/attachment/small/{}.jpeg", owner, id);
            let rendered = thumbnailed.thumbnail;
            attachment.thumbnail_size = rendered.data.len() as i64;
            self.ctx.storage.write(&small_path, rendered.data).await?;
            attachment.thumbnail_path = Some(small_path);
            attachment.thumbnail_content_type = Some(rendered.content_type.to_string());
            attachment.width = i32::try_from(thumbnailed.source_width).ok();
            attachment.height = i32::try_from(thumbnailed.source_height).ok();
        }

        attachment.processing = ProcessingStatus::Processed;
        attachment.cached = true;
        attachment.updated_at = Utc::now();
        self.ctx.attachments.update(&attachment).await?;

        Ok(attachment)
    }

    /// Mark a new attachment as errored. A failed recache puts the record
    /// back as it was: its metadata is still valid and can be fetched again.
    async fn record_failure(&self) {
        let mut attachment = self.initial.clone();
        if !self.recache {
            attachment.processing = ProcessingStatus::Error;
        }
        attachment.updated_at = Utc::now();
        if let Err(e) = self.ctx.attachments.update(&attachment).await {
            tracing::warn!(
                attachment_id = %attachment.id,
                "Could not mark attachment as failed: {}",
                e
            );
        }
    }
}

fn apply_info(attachment: &mut MediaAttachment, info: AdditionalMediaInfo) -> AppResult<()> {
    if let Some(created_at) = info.created_at {
        attachment.created_at = created_at;
    }
    if info.status_id.is_some() {
        attachment.status_id = info.status_id;
    }
    if info.remote_url.is_some() {
        attachment.remote_url = info.remote_url;
    }
    if info.description.is_some() {
        attachment.description = info.description;
    }
    if info.blurhash.is_some() {
        attachment.blurhash = info.blurhash;
    }
    if let Some(avatar) = info.avatar {
        attachment.avatar = avatar;
    }
    if let Some(header) = info.header {
        attachment.header = header;
    }
    if let Some(x) = info.focus_x {
        if !valid_focus(x) {
            return Err(AppError::validation(format!("Focus x {} out of range", x)));
        }
        attachment.focus_x = x;
    }
    if let Some(y) = info.focus_y {
        if !valid_focus(y) {
            return Err(AppError::validation(format!("Focus y {} out of range", y)));
        }
        attachment.focus_y = y;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use mediahub_core::config::MediaConfig;
    use mediahub_core::error::ErrorKind;
    use mediahub_core::traits::storage::StorageProvider;
    use mediahub_database::AttachmentRepository;

    use crate::testing::{counting, fixture, fixture_with, png};
    use crate::types::{post_data_fn, static_data};

    #[tokio::test]
    async fn test_prepare_rejects_nil_account() {
        let fx = fixture().await;
        let err = ProcessingMedia::prepare(
            &fx.ctx,
            static_data(png(4, 4)),
            None,
            AccountId::from_uuid(uuid::Uuid::nil()),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(fx.repo.attachment_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_rejects_out_of_range_focus() {
        let fx = fixture().await;
        let info = AdditionalMediaInfo {
            focus_y: Some(-1.5),
            ..Default::default()
        };
        let err = ProcessingMedia::prepare(
            &fx.ctx,
            static_data(png(4, 4)),
            None,
            AccountId::new(),
            Some(info),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_load_stores_original_and_thumbnail() {
        let fx = fixture().await;
        let account = AccountId::new();
        let info = AdditionalMediaInfo {
            description: Some("a blue square".to_string()),
            focus_x: Some(0.5),
            ..Default::default()
        };
        let handle =
            ProcessingMedia::prepare(&fx.ctx, static_data(png(1024, 512)), None, account, Some(info))
                .await
                .unwrap();
        assert_eq!(handle.state(), ProcessingState::Queued);

        let stored = handle.load_attachment().await.unwrap();
        assert_eq!(handle.state(), ProcessingState::Done);
        assert!(handle.is_done());
        assert_eq!(stored.media_type, MediaType::Image);
        assert_eq!(stored.processing, ProcessingStatus::Processed);
        assert!(stored.cached);
        assert_eq!((stored.width, stored.height), (Some(1024), Some(512)));
        assert_eq!(stored.description.as_deref(), Some("a blue square"));
        assert_eq!(stored.focus_x, 0.5);

        let original = format!("{}/attachment/original/{}.png", account, stored.id);
        let small = format!("{}/attachment/small/{}.jpeg", account, stored.id);
        assert_eq!(stored.file_path.as_deref(), Some(original.as_str()));
        assert_eq!(stored.thumbnail_path.as_deref(), Some(small.as_str()));
        assert!(fx.storage.exists(&original).await.unwrap());
        assert!(fx.storage.exists(&small).await.unwrap());

        let persisted = fx.repo.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(persisted.processing, ProcessingStatus::Processed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_run_once() {
        let fx = fixture().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(
            ProcessingMedia::prepare(
                &fx.ctx,
                counting(png(32, 32), &calls),
                None,
                AccountId::new(),
                None,
            )
            .await
            .unwrap(),
        );

        let (a, b) = tokio::join!(
            {
                let handle = Arc::clone(&handle);
                async move { handle.load_attachment().await }
            },
            {
                let handle = Arc::clone(&handle);
                async move { handle.load_attachment().await }
            }
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);

        let again = handle.load_attachment().await.unwrap();
        assert_eq!(again.id, handle.attachment_id());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_data_fails_and_is_cached() {
        let fx = fixture().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ProcessingMedia::prepare(
            &fx.ctx,
            counting(Bytes::from_static(b"this is not media"), &calls),
            None,
            AccountId::new(),
            None,
        )
        .await
        .unwrap();

        let err = handle.load_attachment().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Processing);
        assert_eq!(handle.state(), ProcessingState::Failed);

        let again = handle.load_attachment().await.unwrap_err();
        assert_eq!(again.message, err.message);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let persisted = fx
            .repo
            .find_by_id(handle.attachment_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.processing, ProcessingStatus::Error);
        assert!(!persisted.cached);
    }

    #[tokio::test]
    async fn test_oversized_image_rejected() {
        let config = MediaConfig {
            image_max_size: 32,
            ..Default::default()
        };
        let fx = fixture_with(&config).await;
        let handle = ProcessingMedia::prepare(
            &fx.ctx,
            static_data(png(64, 64)),
            None,
            AccountId::new(),
            None,
        )
        .await
        .unwrap();

        let err = handle.load_attachment().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_video_stored_without_thumbnail() {
        let fx = fixture().await;
        let mp4 = Bytes::from_static(b"\0\0\0\x18ftypisom\0\0\x02\0isomiso2mp41");
        let handle =
            ProcessingMedia::prepare(&fx.ctx, static_data(mp4), None, AccountId::new(), None)
                .await
                .unwrap();

        let stored = handle.load_attachment().await.unwrap();
        assert_eq!(stored.media_type, MediaType::Video);
        assert_eq!(stored.file_content_type.as_deref(), Some("video/mp4"));
        assert!(stored.thumbnail_path.is_none());
        assert!(stored.width.is_none());
    }

    #[tokio::test]
    async fn test_post_data_runs_even_when_data_fails() {
        let fx = fixture().await;
        let post_calls = Arc::new(AtomicUsize::new(0));
        let data = crate::types::data_fn(|| async { Err(AppError::storage("remote went away")) });
        let post = post_data_fn({
            let post_calls = Arc::clone(&post_calls);
            move || async move {
                post_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handle = ProcessingMedia::prepare(&fx.ctx, data, Some(post), AccountId::new(), None)
            .await
            .unwrap();
        let err = handle.load_attachment().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandon_fails_with_cancelled_and_keeps_record_received() {
        let fx = fixture().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ProcessingMedia::prepare(
            &fx.ctx,
            counting(png(8, 8), &calls),
            None,
            AccountId::new(),
            None,
        )
        .await
        .unwrap();

        handle.abandon();
        assert_eq!(handle.state(), ProcessingState::Failed);
        let err = handle.load_attachment().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let persisted = fx
            .repo
            .find_by_id(handle.attachment_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.processing, ProcessingStatus::Received);
    }

    #[tokio::test]
    async fn test_abandon_after_load_is_ignored() {
        let fx = fixture().await;
        let handle = ProcessingMedia::prepare(
            &fx.ctx,
            static_data(png(8, 8)),
            None,
            AccountId::new(),
            None,
        )
        .await
        .unwrap();

        handle.load_attachment().await.unwrap();
        handle.abandon();
        assert_eq!(handle.state(), ProcessingState::Done);
        assert!(handle.load_attachment().await.is_ok());
    }

    #[tokio::test]
    async fn test_recache_missing_is_not_found() {
        let fx = fixture().await;
        let err = ProcessingMedia::prepare_recache(
            &fx.ctx,
            static_data(png(8, 8)),
            None,
            AttachmentId::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_recache_restores_pruned_attachment() {
        let fx = fixture().await;
        let mut pruned = MediaAttachment::received(AttachmentId::new(), AccountId::new());
        pruned.remote_url = Some("https://remote.example/media/1.png".to_string());
        pruned.processing = ProcessingStatus::Processed;
        fx.repo.create(&pruned).await.unwrap();

        let handle =
            ProcessingMedia::prepare_recache(&fx.ctx, static_data(png(16, 16)), None, pruned.id)
                .await
                .unwrap();
        assert!(handle.is_recache());
        assert_eq!(handle.attachment_id(), pruned.id);

        let stored = handle.load_attachment().await.unwrap();
        assert!(stored.cached);
        assert_eq!(stored.remote_url, pruned.remote_url);
        assert!(
            fx.storage
                .exists(stored.file_path.as_deref().unwrap())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_recache_keeps_record_status() {
        let fx = fixture().await;
        let mut pruned = MediaAttachment::received(AttachmentId::new(), AccountId::new());
        pruned.remote_url = Some("https://remote.example/media/2.png".to_string());
        pruned.processing = ProcessingStatus::Processed;
        fx.repo.create(&pruned).await.unwrap();

        let unreachable = crate::types::data_fn(|| async {
            Err(AppError::storage("remote host unreachable"))
        });
        let handle = ProcessingMedia::prepare_recache(&fx.ctx, unreachable, None, pruned.id)
            .await
            .unwrap();
        assert!(handle.load_attachment().await.is_err());
        assert_eq!(handle.state(), ProcessingState::Failed);

        let record = fx.repo.find_by_id(pruned.id).await.unwrap().unwrap();
        assert_eq!(record.processing, ProcessingStatus::Processed);
        assert!(!record.cached);
        assert_eq!(record.remote_url, pruned.remote_url);
    }
}
