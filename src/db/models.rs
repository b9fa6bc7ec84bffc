//! Database row models
//!
//! Identifiers are stored as TEXT (UUID strings) and calendar dates as
//! ISO-8601 TEXT; repositories convert to domain types at the boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountRow {
    pub account_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRow {
    pub subscription_id: String,
    pub account_id: String,
    pub started: String,
    pub ended: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArticleRow {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub published_at: Option<String>,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsletterRow {
    pub newsletter_id: String,
    pub account_id: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExperimentRow {
    pub experiment_id: String,
    pub dataset_id: Option<String>,
    pub team_id: Option<String>,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PhaseRow {
    pub phase_id: String,
    pub experiment_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentRow {
    pub assignment_id: String,
    pub account_id: String,
    pub group_id: String,
    pub opted_out: bool,
}

/// One topic/score pair for bulk interest ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInterest {
    pub topic: String,
    pub score: f64,
}
