//! Database initialization
//!
//! Opens (creating if needed) the SQLite store and brings the schema up to
//! date. Safe to call on every startup: table creation is `IF NOT EXISTS`
//! and migrations are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_all_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// In-memory pool with full schema, for tests and throwaway work
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure_connection(&pool).await?;
    create_all_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers while assignments are being appended
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    // Panel tables
    create_accounts_table(pool).await?;
    create_subscriptions_table(pool).await?;
    create_consent_log_table(pool).await?;
    create_account_interests_table(pool).await?;

    // Content and delivery tables
    create_articles_table(pool).await?;
    create_newsletters_table(pool).await?;
    create_impressions_table(pool).await?;
    create_clicks_table(pool).await?;
    create_surveys_table(pool).await?;

    // Experiment tables
    create_teams_table(pool).await?;
    create_team_members_table(pool).await?;
    create_experiments_table(pool).await?;
    create_phases_table(pool).await?;
    create_experiment_groups_table(pool).await?;
    create_recommenders_table(pool).await?;
    create_treatments_table(pool).await?;
    create_assignments_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            account_id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            subscription_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            started TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ended TIMESTAMP,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_account ON subscriptions(account_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_consent_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consent_log (
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

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_consent_log_account ON consent_log(account_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_account_interests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS account_interests (
            account_id TEXT NOT NULL,
            topic TEXT NOT NULL,
            score REAL NOT NULL DEFAULT 0.0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (account_id, topic),
            FOREIGN KEY (account_id) REFERENCES accounts(account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_articles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            article_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            source TEXT,
            published_at TEXT,
            payload TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_newsletters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS newsletters (
            newsletter_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            sent_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            content TEXT,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_impressions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS impressions (
            impression_id TEXT PRIMARY KEY,
            newsletter_id TEXT NOT NULL,
            article_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            FOREIGN KEY (newsletter_id) REFERENCES newsletters(newsletter_id),
            FOREIGN KEY (article_id) REFERENCES articles(article_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_impressions_newsletter ON impressions(newsletter_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_clicks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clicks (
            click_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            newsletter_id TEXT,
            article_id TEXT NOT NULL,
            clicked_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id),
            FOREIGN KEY (article_id) REFERENCES articles(article_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_newsletter ON clicks(newsletter_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_surveys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS surveys (
            survey_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            submitted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            responses TEXT NOT NULL,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_teams_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_team_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            team_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            PRIMARY KEY (team_id, account_id),
            FOREIGN KEY (team_id) REFERENCES teams(team_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_experiments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiments (
            experiment_id TEXT PRIMARY KEY,
            dataset_id TEXT,
            team_id TEXT,
            description TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            FOREIGN KEY (team_id) REFERENCES teams(team_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_phases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS phases (
            phase_id TEXT PRIMARY KEY,
            experiment_id TEXT NOT NULL,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            UNIQUE (experiment_id, name),
            FOREIGN KEY (experiment_id) REFERENCES experiments(experiment_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_phases_dates ON phases(start_date, end_date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_experiment_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiment_groups (
            group_id TEXT PRIMARY KEY,
            experiment_id TEXT NOT NULL,
            name TEXT NOT NULL,
            minimum_size INTEGER NOT NULL,
            UNIQUE (experiment_id, name),
            FOREIGN KEY (experiment_id) REFERENCES experiments(experiment_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recommenders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recommenders (
            recommender_id TEXT PRIMARY KEY,
            experiment_id TEXT NOT NULL,
            name TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            UNIQUE (experiment_id, name),
            FOREIGN KEY (experiment_id) REFERENCES experiments(experiment_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_treatments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS treatments (
            treatment_id TEXT PRIMARY KEY,
            phase_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            recommender_id TEXT NOT NULL,
            template TEXT,
            FOREIGN KEY (phase_id) REFERENCES phases(phase_id),
            FOREIGN KEY (group_id) REFERENCES experiment_groups(group_id),
            FOREIGN KEY (recommender_id) REFERENCES recommenders(recommender_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_treatments_phase ON treatments(phase_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            assignment_id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            opted_out INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (account_id) REFERENCES accounts(account_id),
            FOREIGN KEY (group_id) REFERENCES experiment_groups(group_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_group ON assignments(group_id)")
        .execute(pool)
        .await?;

    Ok(())
}
