//! Shared fixtures for unit tests.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use mediahub_core::config::MediaConfig;
use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::traits::storage::StorageProvider;
use mediahub_core::types::{AccountId, AttachmentId};
use mediahub_database::AttachmentRepository;
use mediahub_database::repositories::{MemoryMediaRepository, RemoteCacheStats};
use mediahub_entity::{MediaAttachment, ProcessingStatus};
use mediahub_storage::LocalStorageProvider;

use crate::context::MediaContext;
use crate::types::{DataFn, data_fn};

pub(crate) struct Fixture {
    // Keeps the storage root alive for the duration of the test.
    pub _dir: TempDir,
    pub repo: MemoryMediaRepository,
    pub storage: Arc<LocalStorageProvider>,
    pub ctx: MediaContext,
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(&MediaConfig::default()).await
}

pub(crate) async fn fixture_with(config: &MediaConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let repo = MemoryMediaRepository::new();
    let storage = Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
    let ctx = MediaContext::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        storage.clone(),
        config,
    );
    Fixture {
        _dir: dir,
        repo,
        storage,
        ctx,
    }
}

pub(crate) fn png(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba([40, 120, 200, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    Bytes::from(buf)
}

/// A data callback that counts how many times it was invoked.
pub(crate) fn counting(data: Bytes, calls: &Arc<AtomicUsize>) -> DataFn {
    let calls = Arc::clone(calls);
    data_fn(move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    })
}

/// Insert a processed, cached remote attachment created `days_old` days ago,
/// with both blobs on disk.
pub(crate) async fn seed_cached_remote(fx: &Fixture, days_old: i64) -> MediaAttachment {
    let mut a = MediaAttachment::received(AttachmentId::new(), AccountId::new());
    a.remote_url = Some(format!("https://remote.example/media/{}", a.id));
    a.processing = ProcessingStatus::Processed;
    a.cached = true;
    a.created_at = Utc::now() - chrono::Duration::days(days_old);

    let original = format!("{}/attachment/original/{}.png", a.account_id, a.id);
    let small = format!("{}/attachment/small/{}.jpeg", a.account_id, a.id);
    fx.storage
        .write(&original, Bytes::from_static(b"original"))
        .await
        .unwrap();
    fx.storage
        .write(&small, Bytes::from_static(b"small"))
        .await
        .unwrap();
    a.file_path = Some(original);
    a.thumbnail_path = Some(small);

    AttachmentRepository::create(&fx.repo, &a).await.unwrap();
    a
}

/// Attachment store over the fixture's memory repo that can fail the first
/// scans and slow down every update.
#[derive(Debug)]
pub(crate) struct ScriptedAttachments {
    inner: MemoryMediaRepository,
    failing_scans: usize,
    update_delay: Duration,
    scans: AtomicUsize,
}

impl ScriptedAttachments {
    pub(crate) fn new(inner: MemoryMediaRepository) -> Self {
        Self {
            inner,
            failing_scans: 0,
            update_delay: Duration::ZERO,
            scans: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_scans(mut self, count: usize) -> Self {
        self.failing_scans = count;
        self
    }

    pub(crate) fn update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }

    /// Scans attempted so far, failed ones included.
    pub(crate) fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentRepository for ScriptedAttachments {
    async fn create(&self, attachment: &MediaAttachment) -> AppResult<()> {
        AttachmentRepository::create(&self.inner, attachment).await
    }

    async fn update(&self, attachment: &MediaAttachment) -> AppResult<()> {
        tokio::time::sleep(self.update_delay).await;
        AttachmentRepository::update(&self.inner, attachment).await
    }

    async fn find_by_id(&self, id: AttachmentId) -> AppResult<Option<MediaAttachment>> {
        AttachmentRepository::find_by_id(&self.inner, id).await
    }

    async fn find_cached_remote_older_than(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<MediaAttachment>> {
        let scan = self.scans.fetch_add(1, Ordering::SeqCst);
        if scan < self.failing_scans {
            return Err(AppError::internal("database connection reset"));
        }
        self.inner.find_cached_remote_older_than(older_than, limit).await
    }

    async fn remote_cache_stats(&self) -> AppResult<RemoteCacheStats> {
        self.inner.remote_cache_stats().await
    }
}

/// Wait until at least `count` remote attachments are uncached.
pub(crate) async fn wait_for_uncached(repo: &MemoryMediaRepository, count: u64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while repo.remote_cache_stats().await.unwrap().uncached < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("remote attachments not uncached in time");
}
