//! Shared test helpers for integration tests.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use mediahub_core::config::MediaConfig;
use mediahub_database::repositories::MemoryMediaRepository;
use mediahub_media::{MediaContext, MediaManager};
use mediahub_storage::LocalStorageProvider;

/// Test application context
pub struct TestApp {
    /// The manager under test
    pub manager: MediaManager,
    /// Metadata store shared with the manager
    pub repo: MemoryMediaRepository,
    /// Blob store shared with the manager
    pub storage: Arc<LocalStorageProvider>,
    _dir: TempDir,
}

impl TestApp {
    /// Create a manager with `workers` workers and the given cache age
    pub async fn new(workers: usize, remote_cache_days: u32) -> Self {
        let config = MediaConfig {
            worker_count: Some(workers),
            remote_cache_days,
            ..Default::default()
        };

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let repo = MemoryMediaRepository::new();
        let storage = Arc::new(
            LocalStorageProvider::new(dir.path())
                .await
                .expect("Failed to init storage"),
        );
        let ctx = MediaContext::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            storage.clone(),
            &config,
        );
        let manager = MediaManager::new(ctx, &config)
            .await
            .expect("Failed to start media manager");

        Self {
            manager,
            repo,
            storage,
            _dir: dir,
        }
    }
}

/// Encode a solid-colour PNG
pub fn png(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba([250, 200, 10, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode PNG");
    Bytes::from(buf)
}

/// Poll `condition` until it holds, failing the test after ten seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition not reached in time");
}
