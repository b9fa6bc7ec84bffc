//! Newsletter delivery records: sends, impressions, clicks

use crate::db::models::NewsletterRow;
use crate::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct NewsletterRepository {
    pool: SqlitePool,
}

impl NewsletterRepository {
    pub fn new(pool: SqlitePool) -> NewsletterRepository {
        NewsletterRepository { pool }
    }

    /// Record a sent newsletter together with its article impressions.
    ///
    /// The newsletter row and its impression rows commit in one transaction;
    /// a newsletter with half its impressions would corrupt click-through
    /// reporting.
    pub async fn record_newsletter(
        &self,
        account_id: Uuid,
        content: Option<&serde_json::Value>,
        article_ids: &[Uuid],
    ) -> Result<Uuid> {
        let newsletter_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO newsletters (newsletter_id, account_id, content) VALUES (?, ?, ?)")
            .bind(newsletter_id.to_string())
            .bind(account_id.to_string())
            .bind(content.map(|c| c.to_string()))
            .execute(&mut *tx)
            .await?;

        for (position, article_id) in article_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO impressions (impression_id, newsletter_id, article_id, position)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(newsletter_id.to_string())
            .bind(article_id.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(newsletter_id)
    }

    pub async fn fetch_newsletter(&self, newsletter_id: Uuid) -> Result<NewsletterRow> {
        sqlx::query_as::<_, NewsletterRow>(
            "SELECT newsletter_id, account_id, content FROM newsletters WHERE newsletter_id = ?",
        )
        .bind(newsletter_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("newsletter {}", newsletter_id)))
    }

    /// Record a click on an article, optionally tied to the newsletter that
    /// surfaced it
    pub async fn record_click(
        &self,
        account_id: Uuid,
        article_id: Uuid,
        newsletter_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let click_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO clicks (click_id, account_id, newsletter_id, article_id) VALUES (?, ?, ?, ?)",
        )
        .bind(click_id.to_string())
        .bind(account_id.to_string())
        .bind(newsletter_id.map(|id| id.to_string()))
        .bind(article_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(click_id)
    }

    /// Reporting: number of clicks attributed to one newsletter
    pub async fn click_count(&self, newsletter_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks WHERE newsletter_id = ?")
            .bind(newsletter_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Reporting: impressions shown in one newsletter, in display order
    pub async fn impression_count(&self, newsletter_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM impressions WHERE newsletter_id = ?")
                .bind(newsletter_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
