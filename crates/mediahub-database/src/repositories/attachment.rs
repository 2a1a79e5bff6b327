//! Postgres attachment repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::AttachmentId;
use mediahub_entity::MediaAttachment;

use super::{AttachmentRepository, RemoteCacheStats};

const REMOTE: &str = "remote_url IS NOT NULL AND remote_url <> ''";

/// Attachment repository backed by the `media_attachments` table.
#[derive(Debug, Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    /// Create a new attachment repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn create(&self, a: &MediaAttachment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO media_attachments (id, account_id, status_id, remote_url, media_type, \
             processing, cached, file_path, file_content_type, file_size, thumbnail_path, \
             thumbnail_content_type, thumbnail_size, width, height, description, blurhash, \
             focus_x, focus_y, avatar, header, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23)",
        )
        .bind(a.id)
        .bind(a.account_id)
        .bind(a.status_id)
        .bind(&a.remote_url)
        .bind(a.media_type)
        .bind(a.processing)
        .bind(a.cached)
        .bind(&a.file_path)
        .bind(&a.file_content_type)
        .bind(a.file_size)
        .bind(&a.thumbnail_path)
        .bind(&a.thumbnail_content_type)
        .bind(a.thumbnail_size)
        .bind(a.width)
        .bind(a.height)
        .bind(&a.description)
        .bind(&a.blurhash)
        .bind(a.focus_x)
        .bind(a.focus_y)
        .bind(a.avatar)
        .bind(a.header)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::conflict(format!("Attachment {} already exists", a.id))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create attachment", e)
            }
        })?;
        Ok(())
    }

    async fn update(&self, a: &MediaAttachment) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE media_attachments SET status_id = $2, remote_url = $3, media_type = $4, \
             processing = $5, cached = $6, file_path = $7, file_content_type = $8, \
             file_size = $9, thumbnail_path = $10, thumbnail_content_type = $11, \
             thumbnail_size = $12, width = $13, height = $14, description = $15, \
             blurhash = $16, focus_x = $17, focus_y = $18, avatar = $19, header = $20, \
             updated_at = $21 \
             WHERE id = $1",
        )
        .bind(a.id)
        .bind(a.status_id)
        .bind(&a.remote_url)
        .bind(a.media_type)
        .bind(a.processing)
        .bind(a.cached)
        .bind(&a.file_path)
        .bind(&a.file_content_type)
        .bind(a.file_size)
        .bind(&a.thumbnail_path)
        .bind(&a.thumbnail_content_type)
        .bind(a.thumbnail_size)
        .bind(a.width)
        .bind(a.height)
        .bind(&a.description)
        .bind(&a.blurhash)
        .bind(a.focus_x)
        .bind(a.focus_y)
        .bind(a.avatar)
        .bind(a.header)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update attachment", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Attachment {} not found", a.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: AttachmentId) -> AppResult<Option<MediaAttachment>> {
        sqlx::query_as::<_, MediaAttachment>("SELECT * FROM media_attachments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find attachment", e))
    }

    async fn find_cached_remote_older_than(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<MediaAttachment>> {
        sqlx::query_as::<_, MediaAttachment>(&format!(
            "SELECT * FROM media_attachments \
             WHERE cached = TRUE AND {REMOTE} AND created_at < $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(older_than)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to list cached remote attachments",
                e,
            )
        })
    }

    async fn remote_cache_stats(&self) -> AppResult<RemoteCacheStats> {
        let (cached, uncached): (i64, i64) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FILTER (WHERE cached), COUNT(*) FILTER (WHERE NOT cached) \
             FROM media_attachments WHERE {REMOTE}"
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count remote attachments", e)
        })?;

        Ok(RemoteCacheStats {
            cached: cached as u64,
            uncached: uncached as u64,
        })
    }
}
