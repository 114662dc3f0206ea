use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio_postgres::types::Json;
use tracing::instrument;

use crate::db::{PgPool, StorageError};

/// Operator verdict on one completed analysis: was the AI right or wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Correct => "correct",
            Feedback::Incorrect => "incorrect",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "correct" => Some(Feedback::Correct),
            "incorrect" => Some(Feedback::Incorrect),
            _ => None,
        }
    }
}

/// Open a `processing` log row for an email, atomically with the check that
/// no other analysis of the same email is running or finished. `None` means
/// another worker got there first; the caller must skip the email.
#[instrument(skip(pool))]
pub async fn insert_processing(
    pool: &PgPool,
    email_id: i64,
    model: &str,
) -> Result<Option<i64>, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "INSERT INTO haven.ai_analysis_logs (email_id, status, model, started_at)
             SELECT $1, 'processing', $2, NOW()
             WHERE NOT EXISTS (
                 SELECT 1 FROM haven.ai_analysis_logs
                 WHERE email_id = $1 AND status IN ('processing', 'completed')
             )
             RETURNING id",
        )
        .await?;
    let row = client.query_opt(&stmt, &[&email_id, &model]).await?;
    row.map(|r| r.try_get("id").map_err(StorageError::from))
        .transpose()
}

#[instrument(skip(pool, result))]
pub async fn complete(
    pool: &PgPool,
    log_id: i64,
    overall_confidence: f64,
    result: &Value,
    estimated_cost_usd: f64,
) -> Result<(), StorageError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE haven.ai_analysis_logs SET
                status = 'completed',
                overall_confidence = $2,
                result = $3,
                estimated_cost_usd = $4,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE id = $1 AND status = 'processing'",
            &[&log_id, &overall_confidence, &Json(result), &estimated_cost_usd],
        )
        .await?;
    if updated == 0 {
        return Err(StorageError::NotFound(format!(
            "processing log {log_id} not found"
        )));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn fail(pool: &PgPool, log_id: i64, error: &str) -> Result<(), StorageError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE haven.ai_analysis_logs SET
                status = 'failed',
                error = $2,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE id = $1 AND status = 'processing'",
            &[&log_id, &error],
        )
        .await?;
    if updated == 0 {
        return Err(StorageError::NotFound(format!(
            "processing log {log_id} not found"
        )));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn record_feedback(
    pool: &PgPool,
    log_id: i64,
    feedback: Feedback,
) -> Result<(), StorageError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE haven.ai_analysis_logs SET
                user_feedback = $2,
                updated_at = NOW()
             WHERE id = $1 AND status = 'completed'",
            &[&log_id, &feedback.as_str()],
        )
        .await?;
    if updated == 0 {
        return Err(StorageError::NotFound(format!(
            "completed log {log_id} not found"
        )));
    }
    Ok(())
}

/// Mark long-running `processing` rows as failed so their emails become
/// eligible for analysis again. A crashed worker otherwise leaves its email
/// stuck behind the in-flight guard forever.
#[instrument(skip(pool))]
pub async fn fail_stale_processing(
    pool: &PgPool,
    now: DateTime<Utc>,
    max_processing: Duration,
) -> Result<u64, StorageError> {
    let client = pool.get().await?;
    let cutoff = now - max_processing;
    let rows = client
        .execute(
            "UPDATE haven.ai_analysis_logs SET
                status = 'failed',
                error = 'analysis timed out, reclaimed by recovery',
                completed_at = $1,
                updated_at = $1
             WHERE status = 'processing'
               AND COALESCE(started_at, created_at) <= $2",
            &[&now, &cutoff],
        )
        .await?;
    Ok(rows)
}
