//! Database migration command.

use mediahub_core::error::AppError;

use crate::output;

/// Apply all pending migrations
pub async fn execute(env: &str) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let db = super::connect(&config).await?;

    println!("Running database migrations...");
    let result = mediahub_database::migration::run_migrations(db.pool()).await;
    db.close().await;
    result?;

    output::print_success("All migrations applied successfully.");
    Ok(())
}
