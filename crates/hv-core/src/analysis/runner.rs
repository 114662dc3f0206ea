//! Database-facing orchestration of one email analysis: log state machine,
//! rule baseline, model passes, guarded persistence and auto task creation.

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{select_auto_create_tasks, AnalysisEngine, AnalysisResult};
use crate::classify::{classify, Category, Classification};
use crate::db::emails::AnalysisUpdate;
use crate::db::tasks::TaskInsert;
use crate::db::{analysis_logs, emails, housing_authorities, properties, tasks, PgPool, StorageError};
use crate::entities::{EntityDetector, UtilityKind};
use crate::extraction::{extract_facts, ExtractedFacts};
use crate::llm::LanguageModel;
use crate::synth::{detect_inspection_task_type, TaskDraft, TaskSource};
use crate::EmailMessage;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("email has no id")]
    MissingEmailId,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What happened to one email.
#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    /// All passes merged and persisted.
    Analyzed {
        tasks_created: usize,
        confidence: f64,
        cost_usd: f64,
    },
    /// Another worker holds or finished this email.
    Skipped,
    /// Total model failure; the rule baseline stands and the log is failed.
    Degraded,
}

/// Extraction output plus detected counterparties, stored as the email's
/// extracted-data JSON.
fn extracted_payload(
    detector: &EntityDetector,
    email: &EmailMessage,
    category: Category,
    facts: &ExtractedFacts,
) -> serde_json::Value {
    let authority = detector.detect_housing_authority(&email.sender_email, &email.subject);
    let utility = detector.detect_utility(&email.sender_email, &email.subject);
    let inspection_type = (category == Category::InspectionConfirmation)
        .then(|| detect_inspection_task_type(&email.subject).as_str());

    json!({
        "property_address": facts.property_address,
        "inspection_date": facts.inspection_date,
        "bill": facts.bill,
        "housing_authority": authority.map(|a| a.as_str()),
        "utility_company": utility.map(|u| u.as_str()),
        "inspection_type": inspection_type,
    })
}

/// Rule-based classification plus persistence, shared by the classifier
/// worker and the analysis runner's baseline step. The SQL guard makes this
/// a no-op for already-categorized emails; the returned flag says whether
/// this call actually wrote the verdict.
pub async fn classify_and_persist(
    pool: &PgPool,
    detector: &EntityDetector,
    email: &EmailMessage,
) -> Result<(Classification, bool), RunnerError> {
    let email_id = email.id.ok_or(RunnerError::MissingEmailId)?;
    let today = Utc::now().date_naive();
    let body = email.body_preview_text();

    let classification = classify(detector, &email.subject, body, &email.sender_email, today);
    let facts = extract_facts(&email.subject, body);
    let extracted = extracted_payload(detector, email, classification.category, &facts);

    let rows = emails::update_classification(
        pool,
        email_id,
        classification.category,
        classification.priority,
        &extracted,
        &email.subject,
    )
    .await?;
    Ok((classification, rows > 0))
}

async fn create_suggested_tasks(
    pool: &PgPool,
    email: &EmailMessage,
    result: &AnalysisResult,
    housing_authority_id: Option<i64>,
    utility: Option<UtilityKind>,
) -> Result<usize, RunnerError> {
    let email_id = email.id.ok_or(RunnerError::MissingEmailId)?;
    let selected = select_auto_create_tasks(result.overall_confidence, &result.tasks.tasks);
    if selected.is_empty() {
        return Ok(0);
    }

    let existing = tasks::titles_for_email(pool, email_id).await?;
    let today = Utc::now().date_naive();
    let mut created = 0usize;

    for suggestion in selected {
        if existing.iter().any(|title| title == &suggestion.title) {
            continue;
        }
        let draft = TaskDraft {
            title: suggestion.title.clone(),
            description: suggestion.description.clone(),
            task_type: suggestion.task_type,
            priority: suggestion.priority,
            due_date: suggestion.due_date,
            confidence: suggestion.confidence,
            property_id: result.property_match.property_id,
            housing_authority_id,
            utility_company: utility,
            source: TaskSource::AiAnalysis,
        };
        let insert = TaskInsert::from_draft(&draft, email.organization_id, Some(email_id), today);
        // One bad suggestion must not block the rest.
        match tasks::insert_task(pool, &insert).await {
            Ok(_) => created += 1,
            Err(err) => {
                warn!(email_id, title = %insert.title, error = %err, "task insert failed, continuing");
            }
        }
    }
    Ok(created)
}

fn result_snapshot(result: &AnalysisResult) -> serde_json::Value {
    json!({
        "categorization": {
            "category": result.categorization.category.as_str(),
            "confidence": result.categorization.confidence,
            "reasoning": result.categorization.reasoning,
        },
        "priority": {
            "priority": result.priority.priority.as_str(),
            "confidence": result.priority.confidence,
            "reasoning": result.priority.reasoning,
        },
        "tasks": {
            "suggestions": result.tasks.tasks,
            "confidence": result.tasks.confidence,
            "reasoning": result.tasks.reasoning,
        },
        "property_match": result.property_match,
        "overall_confidence": result.overall_confidence,
    })
}

/// Full analysis of one email. Rule classification is persisted before any
/// model call, so a model outage leaves the email triaged.
pub async fn analyze_email<M: LanguageModel>(
    pool: &PgPool,
    engine: &AnalysisEngine<M>,
    detector: &EntityDetector,
    email: &EmailMessage,
) -> Result<RunOutcome, RunnerError> {
    let email_id = email.id.ok_or(RunnerError::MissingEmailId)?;

    let Some(log_id) = analysis_logs::insert_processing(pool, email_id, engine.model_name()).await?
    else {
        return Ok(RunOutcome::Skipped);
    };

    let (classification, _) = classify_and_persist(pool, detector, email).await?;
    let rule_category = email.category.unwrap_or(classification.category);
    let rule_priority = if email.processed() {
        email.priority_level
    } else {
        classification.priority
    };

    let facts = extract_facts(&email.subject, email.body_preview_text());
    let directory = properties::fetch_for_organization(pool, email.organization_id).await?;

    let result = match engine.analyze(email, rule_category, &facts, &directory).await {
        Ok(result) => result,
        Err(err) => {
            warn!(email_id, error = %err, "analysis degraded to rule baseline");
            analysis_logs::fail(pool, log_id, &err.to_string()).await?;
            return Ok(RunOutcome::Degraded);
        }
    };

    let extracted = extracted_payload(detector, email, rule_category, &facts);
    let update = AnalysisUpdate {
        category: result.effective_category(rule_category),
        priority: result.effective_priority(rule_priority),
        confidence: result.overall_confidence,
        extracted_data: &extracted,
        property_id: result.property_match.property_id,
        requires_action: !result.tasks.tasks.is_empty(),
    };
    emails::update_analysis_results(pool, email_id, &update).await?;

    let authority = detector.detect_housing_authority(&email.sender_email, &email.subject);
    let housing_authority_id = match authority {
        Some(kind) => {
            Some(housing_authorities::find_or_create(pool, email.organization_id, kind).await?)
        }
        None => None,
    };
    let utility = detector.detect_utility(&email.sender_email, &email.subject);

    let tasks_created =
        create_suggested_tasks(pool, email, &result, housing_authority_id, utility).await?;

    analysis_logs::complete(
        pool,
        log_id,
        result.overall_confidence,
        &result_snapshot(&result),
        result.estimated_cost_usd,
    )
    .await?;

    info!(
        email_id,
        category = update.category.as_str(),
        confidence = result.overall_confidence,
        tasks_created,
        "analysis completed"
    );
    Ok(RunOutcome::Analyzed {
        tasks_created,
        confidence: result.overall_confidence,
        cost_usd: result.estimated_cost_usd,
    })
}
