use chrono::{NaiveDate, Utc};
use tracing::instrument;

use crate::db::{PgPool, StorageError};
use crate::synth::{default_due_date, TaskDraft, TaskStatus};

/// Fully resolved row for `haven.tasks`. Built from a [`TaskDraft`] so the
/// per-type default due date is applied in exactly one place.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInsert {
    pub organization_id: i64,
    pub email_id: Option<i64>,
    pub property_id: Option<i64>,
    pub housing_authority_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub inspection_type: Option<String>,
    pub utility_company: Option<String>,
    pub priority: String,
    pub due_date: NaiveDate,
    pub confidence: f64,
    pub source: String,
}

impl TaskInsert {
    pub fn from_draft(
        draft: &TaskDraft,
        organization_id: i64,
        email_id: Option<i64>,
        today: NaiveDate,
    ) -> Self {
        TaskInsert {
            organization_id,
            email_id,
            property_id: draft.property_id,
            housing_authority_id: draft.housing_authority_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            task_type: draft.task_type.as_str().to_string(),
            inspection_type: draft
                .task_type
                .is_inspection()
                .then(|| draft.task_type.as_str().to_string()),
            utility_company: draft.utility_company.map(|u| u.as_str().to_string()),
            priority: draft.priority.as_str().to_string(),
            due_date: draft
                .due_date
                .unwrap_or_else(|| default_due_date(draft.task_type, today)),
            confidence: draft.confidence,
            source: draft.source.as_str().to_string(),
        }
    }
}

#[instrument(skip(pool, task), fields(title = %task.title))]
pub async fn insert_task(pool: &PgPool, task: &TaskInsert) -> Result<i64, StorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "INSERT INTO haven.tasks (
                organization_id, email_id, property_id, housing_authority_id,
                title, description, task_type, inspection_type, utility_company,
                status, priority, due_date, confidence, source
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, $12, $13)
            RETURNING id",
        )
        .await?;
    let row = client
        .query_one(
            &stmt,
            &[
                &task.organization_id,
                &task.email_id,
                &task.property_id,
                &task.housing_authority_id,
                &task.title,
                &task.description,
                &task.task_type,
                &task.inspection_type,
                &task.utility_company,
                &task.priority,
                &task.due_date,
                &task.confidence,
                &task.source,
            ],
        )
        .await?;
    Ok(row.try_get("id")?)
}

/// Tasks already created from one email, used to avoid duplicate
/// auto-creation when an analysis is retried.
#[instrument(skip(pool))]
pub async fn titles_for_email(pool: &PgPool, email_id: i64) -> Result<Vec<String>, StorageError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT title FROM haven.tasks WHERE email_id = $1",
            &[&email_id],
        )
        .await?;
    rows.iter()
        .map(|row| row.try_get("title").map_err(StorageError::from))
        .collect()
}

#[instrument(skip(pool))]
pub async fn set_status(
    pool: &PgPool,
    task_id: i64,
    status: TaskStatus,
) -> Result<(), StorageError> {
    let client = pool.get().await?;
    let completed_at = match status {
        TaskStatus::Completed => Some(Utc::now()),
        _ => None,
    };
    let updated = client
        .execute(
            "UPDATE haven.tasks SET status = $2, completed_at = $3, updated_at = NOW()
             WHERE id = $1",
            &[&task_id, &status.as_str(), &completed_at],
        )
        .await?;
    if updated == 0 {
        return Err(StorageError::NotFound(format!("task {task_id} not found")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Priority;
    use crate::synth::{TaskSource, TaskType};

    use crate::entities::UtilityKind;

    fn draft(due_date: Option<NaiveDate>) -> TaskDraft {
        TaskDraft {
            title: "Pay Alabama Power Bill".into(),
            description: "bill".into(),
            task_type: TaskType::UtilityPayment,
            priority: Priority::High,
            due_date,
            confidence: 0.85,
            property_id: Some(3),
            housing_authority_id: None,
            utility_company: Some(UtilityKind::AlabamaPower),
            source: TaskSource::RuleEngine,
        }
    }

    #[test]
    fn from_draft_keeps_explicit_due_date() {
        let due = NaiveDate::from_ymd_opt(2025, 4, 9).unwrap();
        let insert = TaskInsert::from_draft(
            &draft(Some(due)),
            1,
            Some(10),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        );
        assert_eq!(insert.due_date, due);
        assert_eq!(insert.task_type, "utility_payment");
        assert_eq!(insert.source, "rule_engine");
        assert_eq!(insert.email_id, Some(10));
        assert_eq!(insert.utility_company.as_deref(), Some("alabama_power"));
        assert_eq!(insert.inspection_type, None);
    }

    #[test]
    fn from_draft_records_inspection_type_and_authority() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let inspection = TaskDraft {
            title: "Prepare for MHA Inspection".into(),
            description: String::new(),
            task_type: TaskType::InspectionReinspection,
            priority: Priority::High,
            due_date: None,
            confidence: 0.9,
            property_id: Some(3),
            housing_authority_id: Some(44),
            utility_company: None,
            source: TaskSource::RuleEngine,
        };
        let insert = TaskInsert::from_draft(&inspection, 1, Some(10), today);
        assert_eq!(insert.inspection_type.as_deref(), Some("inspection_reinspection"));
        assert_eq!(insert.housing_authority_id, Some(44));
        assert_eq!(insert.utility_company, None);
    }

    #[test]
    fn from_draft_applies_default_due_date() {
        // 2025-04-01 is a Tuesday; payments default to +1 business day.
        let insert = TaskInsert::from_draft(
            &draft(None),
            1,
            None,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        );
        assert_eq!(insert.due_date, NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
    }
}
