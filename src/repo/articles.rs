//! Article storage
//!
//! Articles are opaque payloads here: the platform stores scraped metadata
//! plus the raw document as JSON, and recommendation happens elsewhere.

use crate::db::models::ArticleRow;
use crate::repo::accounts::conflict_on_unique;
use crate::{Error, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct ArticleRepository {
    pool: SqlitePool,
}

impl ArticleRepository {
    pub fn new(pool: SqlitePool) -> ArticleRepository {
        ArticleRepository { pool }
    }

    /// Insert an article; a duplicate URL is a conflict
    pub async fn store_article(
        &self,
        title: &str,
        url: &str,
        source: Option<&str>,
        published_at: Option<NaiveDate>,
        payload: Option<&serde_json::Value>,
    ) -> Result<Uuid> {
        let article_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO articles (article_id, title, url, source, published_at, payload)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article_id.to_string())
        .bind(title)
        .bind(url)
        .bind(source)
        .bind(published_at.map(|d| d.to_string()))
        .bind(payload.map(|p| p.to_string()))
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique)?;

        Ok(article_id)
    }

    pub async fn fetch_article(&self, article_id: Uuid) -> Result<ArticleRow> {
        sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT article_id, title, url, source, published_at, payload
            FROM articles
            WHERE article_id = ?
            "#,
        )
        .bind(article_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("article {}", article_id)))
    }

    /// Most recently published articles, newest first
    pub async fn fetch_recent(&self, limit: i64) -> Result<Vec<ArticleRow>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT article_id, title, url, source, published_at, payload
            FROM articles
            WHERE published_at IS NOT NULL
            ORDER BY published_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
