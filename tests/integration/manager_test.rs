//! End-to-end media manager scenarios.

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use mediahub_core::traits::storage::StorageProvider;
use mediahub_core::types::{AccountId, EmojiId};
use mediahub_database::{AttachmentRepository, EmojiRepository};
use mediahub_entity::ProcessingStatus;
use mediahub_media::types::static_data;
use mediahub_media::{AdditionalEmojiInfo, AdditionalMediaInfo, ProcessingState};

use crate::helpers::{TestApp, eventually, png};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_media_and_emoji_are_processed_in_background() {
    let app = TestApp::new(2, 0).await;
    let account = AccountId::new();

    let media = app
        .manager
        .process_media(static_data(png(600, 300)), None, account, None)
        .await
        .unwrap();
    let emoji_id = EmojiId::new();
    let emoji = app
        .manager
        .process_emoji(
            static_data(png(48, 48)),
            None,
            "sunny",
            emoji_id,
            "https://local.example/emoji/sunny",
            None,
        )
        .await
        .unwrap();

    eventually(|| media.is_done() && emoji.is_done()).await;
    assert_eq!(media.state(), ProcessingState::Done);
    assert_eq!(emoji.state(), ProcessingState::Done);

    let record = AttachmentRepository::find_by_id(&app.repo, media.attachment_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.processing, ProcessingStatus::Processed);
    assert_eq!((record.width, record.height), (Some(600), Some(300)));
    assert!(
        app.storage
            .exists(record.thumbnail_path.as_deref().unwrap())
            .await
            .unwrap()
    );

    let emoji_record = EmojiRepository::find_by_id(&app.repo, emoji_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(emoji_record.processing, ProcessingStatus::Processed);

    app.manager.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_media_lifecycle() {
    let app = TestApp::new(1, 7).await;

    let info = AdditionalMediaInfo {
        remote_url: Some("https://remote.example/media/old.png".to_string()),
        created_at: Some(Utc::now() - Duration::days(10)),
        ..Default::default()
    };
    let media = app
        .manager
        .process_media(static_data(png(32, 32)), None, AccountId::new(), Some(info))
        .await
        .unwrap();
    let stored = media.load_attachment().await.unwrap();
    assert!(stored.cached);

    let pruned = app
        .manager
        .prune_remote(7, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(pruned, 1);

    let evicted = AttachmentRepository::find_by_id(&app.repo, stored.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!evicted.cached);
    assert_eq!(evicted.remote_url, stored.remote_url);
    assert!(
        !app.storage
            .exists(stored.file_path.as_deref().unwrap())
            .await
            .unwrap()
    );

    let recache = app
        .manager
        .recache_media(static_data(png(32, 32)), None, stored.id)
        .await
        .unwrap();
    eventually(|| recache.is_done()).await;
    let restored = recache.load_attachment().await.unwrap();
    assert!(restored.cached);
    assert!(
        app.storage
            .exists(restored.file_path.as_deref().unwrap())
            .await
            .unwrap()
    );

    app.manager.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_emoji_refresh() {
    let app = TestApp::new(1, 0).await;
    let id = EmojiId::new();
    let info = || AdditionalEmojiInfo {
        domain: Some("remote.example".to_string()),
        image_remote_url: Some("https://remote.example/emoji/wave.png".to_string()),
        ..Default::default()
    };

    let first = app
        .manager
        .process_emoji(
            static_data(png(16, 16)),
            None,
            "wave",
            id,
            "https://remote.example/emoji/wave",
            Some(info()),
        )
        .await
        .unwrap();
    first.load_emoji().await.unwrap();

    let refreshed = app
        .manager
        .process_emoji(
            static_data(png(24, 24)),
            None,
            "wave",
            id,
            "https://remote.example/emoji/wave",
            Some(info()),
        )
        .await
        .unwrap();
    assert!(refreshed.is_refresh());
    let emoji = refreshed.load_emoji().await.unwrap();
    assert_eq!(emoji.id, id);
    assert_eq!(emoji.domain.as_deref(), Some("remote.example"));

    app.manager.stop().await.unwrap();
}
