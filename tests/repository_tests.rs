//! CRUD and bulk-ingestion tests for the platform repositories

use anyhow::Result;
use chrono::NaiveDate;
use pressroom::db::init::init_memory_database;
use pressroom::db::models::AccountInterest;
use pressroom::repo::{AccountRepository, ArticleRepository, NewsletterRepository};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_account_create_and_fetch() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool);

    let id = repo.create_account("reader@example.com").await?;
    let row = repo.fetch_account(id).await?;

    assert_eq!(row.email, "reader@example.com");
    assert_eq!(Uuid::parse_str(&row.account_id)?, id);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool);

    repo.create_account("reader@example.com").await?;
    let result = repo.create_account("reader@example.com").await;

    assert!(matches!(result, Err(pressroom::Error::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_subscription_lifecycle() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool);

    let account = repo.create_account("reader@example.com").await?;
    let sub = repo.start_subscription(account).await?;

    let subs = repo.list_subscriptions(account).await?;
    assert_eq!(subs.len(), 1);
    assert!(subs[0].ended.is_none());

    repo.end_subscription(sub).await?;

    let subs = repo.list_subscriptions(account).await?;
    assert!(subs[0].ended.is_some(), "ended timestamp set, row kept");

    Ok(())
}

#[tokio::test]
async fn test_end_unknown_subscription_is_not_found() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool);

    let result = repo.end_subscription(Uuid::new_v4()).await;
    assert!(matches!(result, Err(pressroom::Error::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_bulk_interests_count_and_continue() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool);

    let account = repo.create_account("reader@example.com").await?;
    let interests = vec![
        AccountInterest {
            topic: "politics".to_string(),
            score: 0.9,
        },
        AccountInterest {
            topic: "sports".to_string(),
            score: 0.2,
        },
    ];

    let failed = repo.store_interests(account, &interests).await?;
    assert_eq!(failed, 0);

    // Re-ingestion upserts rather than failing
    let failed = repo.store_interests(account, &interests).await?;
    assert_eq!(failed, 0);

    // An unknown account violates the foreign key per row; the call still
    // completes and reports the failure count instead of raising
    let failed = repo.store_interests(Uuid::new_v4(), &interests).await?;
    assert_eq!(failed, 2);

    Ok(())
}

#[tokio::test]
async fn test_article_store_and_recent_ordering() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = ArticleRepository::new(pool);

    let d = |day| NaiveDate::from_ymd_opt(2026, 8, day);
    repo.store_article("older", "http://news/1", Some("wire"), d(1), None)
        .await?;
    let newest = repo
        .store_article(
            "newest",
            "http://news/2",
            Some("wire"),
            d(20),
            Some(&json!({"body": "text"})),
        )
        .await?;
    repo.store_article("middle", "http://news/3", None, d(10), None)
        .await?;

    let recent = repo.fetch_recent(2).await?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].title, "newest");
    assert_eq!(recent[1].title, "middle");

    let row = repo.fetch_article(newest).await?;
    let payload: serde_json::Value = serde_json::from_str(row.payload.as_deref().unwrap())?;
    assert_eq!(payload["body"], "text");

    Ok(())
}

#[tokio::test]
async fn test_duplicate_article_url_is_conflict() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = ArticleRepository::new(pool);

    repo.store_article("a", "http://news/1", None, None, None)
        .await?;
    let result = repo.store_article("b", "http://news/1", None, None, None).await;

    assert!(matches!(result, Err(pressroom::Error::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_newsletter_with_impressions_and_clicks() -> Result<()> {
    let pool = init_memory_database().await?;
    let accounts = AccountRepository::new(pool.clone());
    let articles = ArticleRepository::new(pool.clone());
    let newsletters = NewsletterRepository::new(pool);

    let account = accounts.create_account("reader@example.com").await?;
    let a1 = articles
        .store_article("a1", "http://news/1", None, None, None)
        .await?;
    let a2 = articles
        .store_article("a2", "http://news/2", None, None, None)
        .await?;

    let newsletter = newsletters
        .record_newsletter(account, Some(&json!({"subject": "daily"})), &[a1, a2])
        .await?;

    assert_eq!(newsletters.impression_count(newsletter).await?, 2);
    assert_eq!(newsletters.click_count(newsletter).await?, 0);

    newsletters.record_click(account, a2, Some(newsletter)).await?;
    assert_eq!(newsletters.click_count(newsletter).await?, 1);

    let row = newsletters.fetch_newsletter(newsletter).await?;
    let content: serde_json::Value = serde_json::from_str(row.content.as_deref().unwrap())?;
    assert_eq!(content["subject"], "daily");

    Ok(())
}

#[tokio::test]
async fn test_newsletter_impression_failure_rolls_back_send() -> Result<()> {
    let pool = init_memory_database().await?;
    let accounts = AccountRepository::new(pool.clone());
    let newsletters = NewsletterRepository::new(pool.clone());

    let account = accounts.create_account("reader@example.com").await?;

    // Unknown article id violates the impressions foreign key; the
    // newsletter row must not survive on its own
    let result = newsletters
        .record_newsletter(account, None, &[Uuid::new_v4()])
        .await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM newsletters")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn test_survey_storage() -> Result<()> {
    let pool = init_memory_database().await?;
    let repo = AccountRepository::new(pool.clone());

    let account = repo.create_account("reader@example.com").await?;
    repo.record_survey(account, &json!({"q1": "agree", "q2": 4}))
        .await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM surveys WHERE account_id = ?")
        .bind(account.to_string())
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}
