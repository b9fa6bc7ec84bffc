//! Database schema migrations
//!
//! Versioned migrations so existing panel databases upgrade in place without
//! manual intervention. `init_database` creates new databases at the current
//! schema, so migrations only do work on stores created by older releases.
//!
//! Guidelines:
//!
//! 1. Never modify an existing migration; add a new one.
//! 2. Keep each migration idempotent (safe to run multiple times).
//! 3. Prefer ALTER TABLE over DROP/CREATE to preserve data.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: Add opted_out column to assignments table
///
/// Early databases deleted assignment rows on withdrawal, losing the audit
/// trail. Withdrawals are now a soft flag on the kept record.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add opted_out column to assignments");

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='assignments'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        info!("  assignments table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'opted_out'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  opted_out column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE assignments ADD COLUMN opted_out INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await?;

    info!("  Added opted_out column to assignments table");
    Ok(())
}

/// Migration v2: Create consent_log table
///
/// Experiment eligibility requires a recorded consent entry per account;
/// databases predating the consent workflow lack the table entirely.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Create consent_log table");

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='consent_log'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if table_exists {
        info!("  consent_log table already exists - skipping");
        return Ok(());
    }

    sqlx::query(
        r#"
        CREATE TABLE consent_log (
            consent_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            document TEXT NOT NULL,
            logged_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX idx_consent_log_account ON consent_log(account_id)")
        .execute(pool)
        .await?;

    info!("  Created consent_log table");
    Ok(())
}

/// Migration v3: Add template column to treatments table
///
/// Treatments gained an optional newsletter template identifier so one
/// recommender can render differently per group.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: Add template column to treatments");

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='treatments'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        info!("  treatments table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('treatments') WHERE name = 'template'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  template column already exists - skipping");
        return Ok(());
    }

    match sqlx::query("ALTER TABLE treatments ADD COLUMN template TEXT")
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  Added template column to treatments table");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            // Another process beat us to it - that's fine
            info!("  template column added concurrently - skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn test_set_and_get_schema_version() {
        let pool = setup_test_db().await;

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
        )
        .execute(&pool)
        .await
        .unwrap();

        set_schema_version(&pool, 1).await.unwrap();
        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_migrate_v1_no_table() {
        let pool = setup_test_db().await;

        // Should succeed even if assignments table doesn't exist
        migrate_v1(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_v1_adds_column() {
        let pool = setup_test_db().await;

        // Old-style assignments table without opted_out
        sqlx::query(
            r#"
            CREATE TABLE assignments (
                assignment_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                group_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate_v1(&pool).await.unwrap();

        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'opted_out'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }

    #[tokio::test]
    async fn test_migrate_v1_idempotent() {
        let pool = setup_test_db().await;

        sqlx::query(
            r#"
            CREATE TABLE assignments (
                assignment_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                opted_out INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate_v1(&pool).await.unwrap();
        migrate_v1(&pool).await.unwrap();

        let column_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'opted_out'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(column_count, 1);
    }

    #[tokio::test]
    async fn test_migrate_v2_creates_consent_log() {
        let pool = setup_test_db().await;

        migrate_v2(&pool).await.unwrap();
        migrate_v2(&pool).await.unwrap();

        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='consent_log')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(table_exists);
    }

    #[tokio::test]
    async fn test_run_migrations_complete_flow() {
        let pool = setup_test_db().await;

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
        )
        .execute(&pool)
        .await
        .unwrap();

        // Old-style treatments table without template
        sqlx::query(
            r#"
            CREATE TABLE treatments (
                treatment_id TEXT PRIMARY KEY,
                phase_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                recommender_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);

        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('treatments') WHERE name = 'template'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }
}
