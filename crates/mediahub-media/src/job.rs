//! Units of work submitted to the worker pool.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mediahub_worker::Task;

use crate::processing::{ProcessingEmoji, ProcessingMedia};

/// Load one handle on a worker.
#[derive(Clone)]
pub(crate) enum MediaJob {
    Media(Arc<ProcessingMedia>),
    Emoji(Arc<ProcessingEmoji>),
}

impl MediaJob {
    /// Fail the handle without loading it.
    pub(crate) fn abandon(&self) {
        match self {
            Self::Media(handle) => handle.abandon(),
            Self::Emoji(handle) => handle.abandon(),
        }
    }
}

#[async_trait]
impl Task for MediaJob {
    fn describe(&self) -> String {
        match self {
            Self::Media(handle) if handle.is_recache() => {
                format!("recache attachment {}", handle.attachment_id())
            }
            Self::Media(handle) => format!("attachment {}", handle.attachment_id()),
            Self::Emoji(handle) => format!("emoji {}", handle.emoji_id()),
        }
    }

    async fn run(self, cancel: CancellationToken) {
        if cancel.is_cancelled() {
            tracing::debug!(job = %self.describe(), "Media manager stopping, abandoning job");
            self.abandon();
            return;
        }

        match self {
            Self::Media(handle) => {
                if let Err(e) = handle.load_attachment().await {
                    tracing::error!(
                        attachment_id = %handle.attachment_id(),
                        recache = handle.is_recache(),
                        "Error loading media: {}",
                        e
                    );
                }
            }
            Self::Emoji(handle) => {
                if let Err(e) = handle.load_emoji().await {
                    tracing::error!(
                        emoji_id = %handle.emoji_id(),
                        shortcode = handle.shortcode(),
                        "Error loading emoji: {}",
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_core::types::AccountId;

    use crate::processing::ProcessingState;
    use crate::testing::{fixture, png};
    use crate::types::static_data;

    #[tokio::test]
    async fn test_run_loads_handle() {
        let fx = fixture().await;
        let handle = Arc::new(
            ProcessingMedia::prepare(&fx.ctx, static_data(png(8, 8)), None, AccountId::new(), None)
                .await
                .unwrap(),
        );

        MediaJob::Media(Arc::clone(&handle))
            .run(CancellationToken::new())
            .await;
        assert_eq!(handle.state(), ProcessingState::Done);
    }

    #[tokio::test]
    async fn test_run_with_cancelled_token_abandons() {
        let fx = fixture().await;
        let handle = Arc::new(
            ProcessingMedia::prepare(&fx.ctx, static_data(png(8, 8)), None, AccountId::new(), None)
                .await
                .unwrap(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        MediaJob::Media(Arc::clone(&handle)).run(cancel).await;

        assert_eq!(handle.state(), ProcessingState::Failed);
        assert!(handle.load_attachment().await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_run_swallows_materialization_errors() {
        let fx = fixture().await;
        let handle = Arc::new(
            ProcessingMedia::prepare(
                &fx.ctx,
                static_data(bytes::Bytes::from_static(b"junk")),
                None,
                AccountId::new(),
                None,
            )
            .await
            .unwrap(),
        );

        MediaJob::Media(Arc::clone(&handle))
            .run(CancellationToken::new())
            .await;
        assert_eq!(handle.state(), ProcessingState::Failed);
        assert!(handle.load_attachment().await.is_err());
    }
}
