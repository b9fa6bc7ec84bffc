//! Account, subscription, consent and survey storage

use crate::db::models::{AccountInterest, AccountRow, SubscriptionRow};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Panel account storage
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> AccountRepository {
        AccountRepository { pool }
    }

    /// Create an account, returning its fresh identity
    pub async fn create_account(&self, email: &str) -> Result<Uuid> {
        let account_id = Uuid::new_v4();

        sqlx::query("INSERT INTO accounts (account_id, email) VALUES (?, ?)")
            .bind(account_id.to_string())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(conflict_on_unique)?;

        Ok(account_id)
    }

    pub async fn fetch_account(&self, account_id: Uuid) -> Result<AccountRow> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, email FROM accounts WHERE account_id = ?",
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("account {}", account_id)))
    }

    pub async fn list_accounts(&self) -> Result<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, email FROM accounts ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Open a new subscription for an account
    pub async fn start_subscription(&self, account_id: Uuid) -> Result<Uuid> {
        let subscription_id = Uuid::new_v4();

        sqlx::query("INSERT INTO subscriptions (subscription_id, account_id) VALUES (?, ?)")
            .bind(subscription_id.to_string())
            .bind(account_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(subscription_id)
    }

    /// Close a subscription by stamping its `ended` time; the row is kept
    pub async fn end_subscription(&self, subscription_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE subscriptions SET ended = CURRENT_TIMESTAMP WHERE subscription_id = ?",
        )
        .bind(subscription_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("subscription {}", subscription_id)));
        }

        Ok(())
    }

    pub async fn list_subscriptions(&self, account_id: Uuid) -> Result<Vec<SubscriptionRow>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT subscription_id, account_id, started, ended
            FROM subscriptions
            WHERE account_id = ?
            ORDER BY started ASC
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Record a consent-log entry for the named policy document
    pub async fn record_consent(&self, account_id: Uuid, document: &str) -> Result<Uuid> {
        let consent_id = Uuid::new_v4();

        sqlx::query("INSERT INTO consent_log (consent_id, account_id, document) VALUES (?, ?, ?)")
            .bind(consent_id.to_string())
            .bind(account_id.to_string())
            .bind(document)
            .execute(&self.pool)
            .await?;

        Ok(consent_id)
    }

    /// Record a survey submission (responses stored as opaque JSON)
    pub async fn record_survey(
        &self,
        account_id: Uuid,
        responses: &serde_json::Value,
    ) -> Result<Uuid> {
        let survey_id = Uuid::new_v4();

        sqlx::query("INSERT INTO surveys (survey_id, account_id, responses) VALUES (?, ?, ?)")
            .bind(survey_id.to_string())
            .bind(account_id.to_string())
            .bind(responses.to_string())
            .execute(&self.pool)
            .await?;

        Ok(survey_id)
    }

    /// Bulk-store topic interests for an account.
    ///
    /// Each row is attempted independently: failures are logged and counted,
    /// and the call returns the failure count instead of aborting, so one bad
    /// row never blocks the rest of the batch. This count-and-continue policy
    /// is for ingestion paths only; the experiment-graph write in
    /// [`crate::repo::ExperimentRepository::store_experiment`] stays
    /// all-or-nothing.
    pub async fn store_interests(
        &self,
        account_id: Uuid,
        interests: &[AccountInterest],
    ) -> Result<usize> {
        let mut failed = 0;

        for interest in interests {
            let result = sqlx::query(
                r#"
                INSERT INTO account_interests (account_id, topic, score)
                VALUES (?, ?, ?)
                ON CONFLICT (account_id, topic)
                DO UPDATE SET score = excluded.score, updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(account_id.to_string())
            .bind(&interest.topic)
            .bind(interest.score)
            .execute(&self.pool)
            .await;

            if let Err(e) = result {
                warn!(
                    "Failed to store interest {:?} for account {}: {}",
                    interest.topic, account_id, e
                );
                failed += 1;
            }
        }

        if failed > 0 {
            warn!(
                "Interest ingestion for account {}: {} of {} rows failed",
                account_id,
                failed,
                interests.len()
            );
        }

        Ok(failed)
    }
}

/// Map unique-constraint violations to `Conflict`, everything else through
pub(crate) fn conflict_on_unique(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Conflict(db_err.message().to_string())
        }
        _ => Error::Database(e),
    }
}
