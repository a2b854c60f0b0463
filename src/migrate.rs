use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Every statement is idempotent.
pub async fn apply(pool: &sqlx::SqlitePool) -> Result<()> {
    // Create files table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            store_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            owner TEXT NOT NULL,
            file_name TEXT NOT NULL,
            object_name TEXT NOT NULL UNIQUE,
            object_url TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create results table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            store_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            owner TEXT NOT NULL,
            file_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            analysis_type TEXT NOT NULL,
            summary_json TEXT,
            overall_json TEXT,
            rows_json TEXT,
            artifact_name TEXT NOT NULL,
            result_url TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_owner ON results(owner, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
