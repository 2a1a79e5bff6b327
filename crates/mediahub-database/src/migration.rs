//! Embedded schema migrations for the media tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;

/// Migrations under the workspace `migrations/` directory, compiled in.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the schema up to date. Already-applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    tracing::info!(known = MIGRATOR.migrations.len(), "Applying media schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Media schema migration failed: {e}"),
            e,
        )
    })?;

    tracing::info!("Media schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_schema_is_embedded() {
        assert!(!MIGRATOR.migrations.is_empty());
        assert!(
            MIGRATOR
                .migrations
                .iter()
                .any(|m| m.sql.contains("media_attachments") && m.sql.contains("emojis"))
        );
    }
}
