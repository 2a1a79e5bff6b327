//! Postgres emoji repository.

use async_trait::async_trait;
use sqlx::PgPool;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::EmojiId;
use mediahub_entity::Emoji;

use super::EmojiRepository;

/// Emoji repository backed by the `emojis` table.
#[derive(Debug, Clone)]
pub struct PgEmojiRepository {
    pool: PgPool,
}

impl PgEmojiRepository {
    /// Create a new emoji repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmojiRepository for PgEmojiRepository {
    async fn create(&self, e: &Emoji) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO emojis (id, shortcode, domain, uri, image_remote_url, \
             image_static_remote_url, image_path, image_static_path, image_content_type, \
             image_static_content_type, image_file_size, image_static_file_size, processing, \
             disabled, visible_in_picker, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18)",
        )
        .bind(e.id)
        .bind(&e.shortcode)
        .bind(&e.domain)
        .bind(&e.uri)
        .bind(&e.image_remote_url)
        .bind(&e.image_static_remote_url)
        .bind(&e.image_path)
        .bind(&e.image_static_path)
        .bind(&e.image_content_type)
        .bind(&e.image_static_content_type)
        .bind(e.image_file_size)
        .bind(e.image_static_file_size)
        .bind(e.processing)
        .bind(e.disabled)
        .bind(e.visible_in_picker)
        .bind(e.category_id)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if err.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::conflict(format!("Emoji :{}: already exists", e.shortcode))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create emoji", err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, e: &Emoji) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE emojis SET shortcode = $2, domain = $3, uri = $4, image_remote_url = $5, \
             image_static_remote_url = $6, image_path = $7, image_static_path = $8, \
             image_content_type = $9, image_static_content_type = $10, image_file_size = $11, \
             image_static_file_size = $12, processing = $13, disabled = $14, \
             visible_in_picker = $15, category_id = $16, updated_at = $17 \
             WHERE id = $1",
        )
        .bind(e.id)
        .bind(&e.shortcode)
        .bind(&e.domain)
        .bind(&e.uri)
        .bind(&e.image_remote_url)
        .bind(&e.image_static_remote_url)
        .bind(&e.image_path)
        .bind(&e.image_static_path)
        .bind(&e.image_content_type)
        .bind(&e.image_static_content_type)
        .bind(e.image_file_size)
        .bind(e.image_static_file_size)
        .bind(e.processing)
        .bind(e.disabled)
        .bind(e.visible_in_picker)
        .bind(e.category_id)
        .bind(e.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| AppError::with_source(ErrorKind::Database, "Failed to update emoji", err))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Emoji {} not found", e.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: EmojiId) -> AppResult<Option<Emoji>> {
        sqlx::query_as::<_, Emoji>("SELECT * FROM emojis WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find emoji", e))
    }

    async fn find_by_shortcode(
        &self,
        shortcode: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<Emoji>> {
        sqlx::query_as::<_, Emoji>(
            "SELECT * FROM emojis WHERE shortcode = $1 AND domain IS NOT DISTINCT FROM $2",
        )
        .bind(shortcode)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find emoji by shortcode", e)
        })
    }
}
