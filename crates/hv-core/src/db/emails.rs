use serde_json::Value;
use tokio_postgres::types::Json;
use tokio_postgres::Row;
use tracing::instrument;

use crate::classify::{Category, Priority};
use crate::db::{PgPool, StorageError};
use crate::subject::subject_hash;
use crate::EmailMessage;

const EMAIL_COLUMNS: &str = "id, organization_id, email_account_id, message_id, thread_id, \
subject, sender_email, sender_name, body_preview, received_at, category, priority_level, \
confidence_score, extracted_data, requires_action, is_read, is_important, property_id";

fn row_to_email(row: &Row) -> Result<EmailMessage, StorageError> {
    let category = row
        .try_get::<_, Option<String>>("category")?
        .map(|c| {
            Category::from_str(&c)
                .ok_or_else(|| StorageError::Mapping(format!("unknown category: {c}")))
        })
        .transpose()?;
    let priority_raw: String = row.try_get("priority_level")?;
    let priority_level = Priority::from_str(&priority_raw)
        .ok_or_else(|| StorageError::Mapping(format!("unknown priority: {priority_raw}")))?;

    Ok(EmailMessage {
        id: Some(row.try_get("id")?),
        organization_id: row.try_get("organization_id")?,
        email_account_id: row.try_get("email_account_id")?,
        message_id: row.try_get("message_id")?,
        thread_id: row.try_get("thread_id")?,
        subject: row.try_get("subject")?,
        sender_email: row.try_get("sender_email")?,
        sender_name: row.try_get("sender_name")?,
        body_preview: row.try_get("body_preview")?,
        received_at: row.try_get("received_at")?,
        category,
        priority_level,
        confidence_score: row.try_get("confidence_score")?,
        extracted_data: row
            .try_get::<_, Option<Json<Value>>>("extracted_data")?
            .map(|j| j.0),
        requires_action: row.try_get("requires_action")?,
        is_read: row.try_get("is_read")?,
        is_important: row.try_get("is_important")?,
        property_id: row.try_get("property_id")?,
    })
}

/// Oldest emails the rule engine has not touched yet.
#[instrument(skip(pool))]
pub async fn fetch_unclassified(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<EmailMessage>, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(&format!(
            "SELECT {EMAIL_COLUMNS} FROM haven.emails
             WHERE category IS NULL
             ORDER BY received_at NULLS LAST, id
             LIMIT $1"
        ))
        .await?;
    let rows = client.query(&stmt, &[&limit]).await?;
    rows.iter().map(row_to_email).collect()
}

/// Rule-classified emails still waiting for model analysis. An email drops
/// out of this set once any log row is completed or processing, or once its
/// failed attempts exhaust the budget.
#[instrument(skip(pool))]
pub async fn fetch_needing_analysis(
    pool: &PgPool,
    limit: i64,
    max_failed_attempts: i64,
) -> Result<Vec<EmailMessage>, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(&format!(
            "SELECT {EMAIL_COLUMNS} FROM haven.emails e
             WHERE e.category IS NOT NULL
               AND NOT EXISTS (
                   SELECT 1 FROM haven.ai_analysis_logs l
                   WHERE l.email_id = e.id AND l.status IN ('processing', 'completed')
               )
               AND (
                   SELECT COUNT(*) FROM haven.ai_analysis_logs l
                   WHERE l.email_id = e.id AND l.status = 'failed'
               ) < $2
             ORDER BY e.received_at NULLS LAST, e.id
             LIMIT $1"
        ))
        .await?;
    let rows = client.query(&stmt, &[&limit, &max_failed_attempts]).await?;
    rows.iter().map(row_to_email).collect()
}

/// Persist the rule engine's verdict. Also stamps the subject hash so
/// repeated thread syncs are visible.
#[instrument(skip(pool, extracted_data))]
pub async fn update_classification(
    pool: &PgPool,
    email_id: i64,
    category: Category,
    priority: Priority,
    extracted_data: &Value,
    subject: &str,
) -> Result<u64, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "UPDATE haven.emails SET
                category = $2,
                priority_level = $3,
                extracted_data = $4,
                subject_hash = $5,
                updated_at = NOW()
             WHERE id = $1 AND category IS NULL",
        )
        .await?;
    let rows = client
        .execute(
            &stmt,
            &[
                &email_id,
                &category.as_str(),
                &priority.as_str(),
                &Json(extracted_data),
                &subject_hash(subject),
            ],
        )
        .await?;
    Ok(rows)
}

pub struct AnalysisUpdate<'a> {
    pub category: Category,
    pub priority: Priority,
    pub confidence: f64,
    pub extracted_data: &'a Value,
    pub property_id: Option<i64>,
    pub requires_action: bool,
}

/// Persist merged analysis output onto the email row.
#[instrument(skip(pool, update))]
pub async fn update_analysis_results(
    pool: &PgPool,
    email_id: i64,
    update: &AnalysisUpdate<'_>,
) -> Result<u64, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "UPDATE haven.emails SET
                category = $2,
                priority_level = $3,
                confidence_score = $4,
                extracted_data = $5,
                property_id = COALESCE($6, property_id),
                requires_action = $7,
                updated_at = NOW()
             WHERE id = $1",
        )
        .await?;
    let rows = client
        .execute(
            &stmt,
            &[
                &email_id,
                &update.category.as_str(),
                &update.priority.as_str(),
                &update.confidence,
                &Json(update.extracted_data),
                &update.property_id,
                &update.requires_action,
            ],
        )
        .await?;
    Ok(rows)
}
