//! Allocation and eligibility queries
//!
//! Read-only, point-in-time questions against persisted assignment, phase and
//! subscription data: which phases are live in a window, who is already
//! assigned, who is still available, and which recommender serves each group
//! on a given date.
//!
//! Two distinct interval predicates are in use and must stay distinct:
//!
//! - window overlap uses a four-case inclusive disjunction, so a window whose
//!   end equals a phase's start still counts as overlapping;
//! - the as-of active-phase test is half-open, `start <= d < end`.

use crate::db::models::AccountRow;
use crate::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

/// Inclusive overlap between a phase and the query window, as four cases:
/// phase starts within the window, phase ends within it, phase contains it,
/// or the window contains the phase.
const PHASE_OVERLAPS_WINDOW: &str = r#"
       (p.start_date >= ?1 AND p.start_date <= ?2)
    OR (p.end_date   >= ?1 AND p.end_date   <= ?2)
    OR (p.start_date <= ?1 AND p.end_date   >= ?2)
    OR (p.start_date >= ?1 AND p.end_date   <= ?2)
"#;

pub struct AllocationQueries {
    pool: SqlitePool,
}

impl AllocationQueries {
    pub fn new(pool: SqlitePool) -> AllocationQueries {
        AllocationQueries { pool }
    }

    /// Accounts with no assignment to any group treated during a phase that
    /// overlaps the window
    pub async fn find_unassigned_accounts(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AccountRow>> {
        let sql = format!(
            r#"
            SELECT a.account_id, a.email
            FROM accounts a
            WHERE a.account_id NOT IN (
                SELECT asg.account_id
                FROM assignments asg
                WHERE asg.group_id IN (
                    SELECT t.group_id
                    FROM treatments t
                    JOIN phases p ON p.phase_id = t.phase_id
                    WHERE {}
                )
            )
            ORDER BY a.email ASC
            "#,
            PHASE_OVERLAPS_WINDOW
        );

        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(start_date)
            .bind(end_date)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Unassigned accounts that also hold an active subscription (no `ended`
    /// timestamp) and have at least one consent-log entry. Both conditions
    /// are required; this is an intersection.
    pub async fn find_experiment_eligible_accounts(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AccountRow>> {
        let sql = format!(
            r#"
            SELECT a.account_id, a.email
            FROM accounts a
            WHERE a.account_id NOT IN (
                SELECT asg.account_id
                FROM assignments asg
                WHERE asg.group_id IN (
                    SELECT t.group_id
                    FROM treatments t
                    JOIN phases p ON p.phase_id = t.phase_id
                    WHERE {}
                )
            )
            AND EXISTS (
                SELECT 1 FROM subscriptions s
                WHERE s.account_id = a.account_id AND s.ended IS NULL
            )
            AND EXISTS (
                SELECT 1 FROM consent_log c
                WHERE c.account_id = a.account_id
            )
            ORDER BY a.email ASC
            "#,
            PHASE_OVERLAPS_WINDOW
        );

        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(start_date)
            .bind(end_date)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Which recommender endpoint serves each group on `as_of_date`.
    ///
    /// Active phases are selected half-open (`start <= as_of < end`), unlike
    /// the window overlap above.
    pub async fn find_active_recommenders_by_group(
        &self,
        as_of_date: NaiveDate,
    ) -> Result<HashMap<Uuid, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT t.group_id, r.endpoint
            FROM treatments t
            JOIN phases p ON p.phase_id = t.phase_id
            JOIN recommenders r ON r.recommender_id = t.recommender_id
            WHERE p.start_date <= ?1 AND ?1 < p.end_date
            "#,
        )
        .bind(as_of_date)
        .fetch_all(&self.pool)
        .await?;

        let mut by_group = HashMap::new();
        for (group_id, endpoint) in rows {
            let group_id = Uuid::parse_str(&group_id)
                .map_err(|e| crate::Error::Validation(format!("bad group_id in store: {}", e)))?;
            by_group.insert(group_id, endpoint);
        }

        Ok(by_group)
    }
}
