//! AI analysis orchestration: four independent model passes over one email,
//! merged by confidence. Rule-based classification always runs first and is
//! persisted before any model call, so a total model outage leaves emails
//! triaged.

pub mod prompts;
pub mod runner;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::classify::{Category, Priority};
use crate::extraction::ExtractedFacts;
use crate::llm::{estimate_cost_usd, CompletionRequest, LanguageModel, LlmError};
use crate::matching::{self, PropertyMatch};
use crate::synth::TaskType;
use crate::{EmailMessage, Property};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("all model passes failed, last error: {0}")]
    AllPassesFailed(String),
}

/// Mean over strictly positive confidences. Failed or zero-confidence passes
/// are excluded entirely rather than dragging the mean down; no positive
/// signal at all yields 0.0.
pub fn combine_confidences(values: &[f64]) -> f64 {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return 0.0;
    }
    positive.iter().sum::<f64>() / positive.len() as f64
}

/// Auto-creation gate: the overall confidence and at least one task must both
/// clear 0.8. Returns only the tasks that individually clear the bar.
pub fn select_auto_create_tasks(
    overall_confidence: f64,
    suggestions: &[TaskSuggestion],
) -> Vec<TaskSuggestion> {
    if overall_confidence < 0.8 {
        return Vec::new();
    }
    suggestions
        .iter()
        .filter(|task| task.confidence >= 0.8)
        .cloned()
        .collect()
}

/// One task proposed by the extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizationOutcome {
    pub category: Category,
    pub confidence: f64,
    pub reasoning: String,
}

impl CategorizationOutcome {
    fn degraded() -> Self {
        CategorizationOutcome {
            category: Category::Unknown,
            confidence: 0.0,
            reasoning: "model call failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskExtractionOutcome {
    pub tasks: Vec<TaskSuggestion>,
    pub confidence: f64,
    pub reasoning: String,
}

impl TaskExtractionOutcome {
    fn degraded() -> Self {
        TaskExtractionOutcome {
            tasks: Vec::new(),
            confidence: 0.0,
            reasoning: "model call failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriorityOutcome {
    pub priority: Priority,
    pub confidence: f64,
    pub reasoning: String,
}

impl PriorityOutcome {
    fn degraded() -> Self {
        PriorityOutcome {
            priority: Priority::Normal,
            confidence: 0.0,
            reasoning: "model call failed".to_string(),
        }
    }
}

/// Merged output of the four passes plus the rule baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub categorization: CategorizationOutcome,
    pub priority: PriorityOutcome,
    pub tasks: TaskExtractionOutcome,
    pub property_match: PropertyMatch,
    pub overall_confidence: f64,
    pub estimated_cost_usd: f64,
}

impl AnalysisResult {
    /// Category to persist: the model's answer when its pass produced any
    /// positive signal, otherwise the rule baseline stands.
    pub fn effective_category(&self, rule_category: Category) -> Category {
        if self.categorization.confidence > 0.0 {
            self.categorization.category
        } else {
            rule_category
        }
    }

    pub fn effective_priority(&self, rule_priority: Priority) -> Priority {
        if self.priority.confidence > 0.0 {
            self.priority.priority
        } else {
            rule_priority
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn confidence_field(value: &Value) -> f64 {
    value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

fn reasoning_field(value: &Value) -> String {
    str_field(value, "reasoning").unwrap_or_default()
}

fn parse_task_suggestion(value: &Value) -> Option<TaskSuggestion> {
    let title = str_field(value, "title").filter(|t| !t.trim().is_empty())?;
    let task_type = str_field(value, "task_type")
        .and_then(|t| TaskType::from_str(&t))
        .unwrap_or(TaskType::Other);
    let priority = str_field(value, "priority")
        .map(|p| Priority::parse_lenient(&p))
        .unwrap_or_default();
    let due_date = str_field(value, "due_date")
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());

    Some(TaskSuggestion {
        title,
        description: str_field(value, "description").unwrap_or_default(),
        task_type,
        priority,
        due_date,
        confidence: confidence_field(value),
    })
}

/// Drives the four passes against one [`LanguageModel`]. Pure with respect to
/// storage; the runner owns persistence.
pub struct AnalysisEngine<M> {
    model: M,
}

impl<M: LanguageModel> AnalysisEngine<M> {
    pub fn new(model: M) -> Self {
        AnalysisEngine { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn call(&self, pass: &str, user_prompt: String) -> (Result<Value, LlmError>, f64) {
        let request = CompletionRequest {
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
            user_prompt,
        };
        let prompt_chars = request.system_prompt.len() + request.user_prompt.len();
        let result = self.model.complete(&request).await;

        match &result {
            Ok(value) => {
                let completion_chars = value.to_string().len();
                (result, estimate_cost_usd(prompt_chars, completion_chars))
            }
            Err(err) => {
                warn!(pass, error = %err, "model pass failed, using degraded default");
                (result, estimate_cost_usd(prompt_chars, 0))
            }
        }
    }

    async fn categorize_pass(
        &self,
        email: &EmailMessage,
    ) -> (Result<CategorizationOutcome, LlmError>, f64) {
        let (result, cost) = self
            .call("categorization", prompts::categorization_prompt(email))
            .await;
        let outcome = result.map(|value| {
            let category = str_field(&value, "category")
                .and_then(|c| Category::from_str(&c))
                .unwrap_or(Category::Unknown);
            CategorizationOutcome {
                category,
                confidence: confidence_field(&value),
                reasoning: reasoning_field(&value),
            }
        });
        (outcome, cost)
    }

    async fn task_pass(
        &self,
        email: &EmailMessage,
        rule_category: Category,
    ) -> (Result<TaskExtractionOutcome, LlmError>, f64) {
        let (result, cost) = self
            .call(
                "task_extraction",
                prompts::task_extraction_prompt(email, rule_category),
            )
            .await;
        let outcome = result.map(|value| {
            let tasks = value
                .get("tasks")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(parse_task_suggestion).collect())
                .unwrap_or_default();
            TaskExtractionOutcome {
                tasks,
                confidence: confidence_field(&value),
                reasoning: reasoning_field(&value),
            }
        });
        (outcome, cost)
    }

    async fn property_pass(
        &self,
        email: &EmailMessage,
        facts: &ExtractedFacts,
        properties: &[Property],
    ) -> (Result<PropertyMatch, LlmError>, f64) {
        let (result, cost) = self
            .call(
                "property_matching",
                prompts::property_matching_prompt(email, properties),
            )
            .await;
        let outcome = result.map(|value| {
            let suggested = str_field(&value, "property_address");
            matching::match_property(
                suggested.as_deref(),
                confidence_field(&value),
                facts.property_address.as_deref(),
                properties,
            )
        });
        (outcome, cost)
    }

    async fn priority_pass(
        &self,
        email: &EmailMessage,
    ) -> (Result<PriorityOutcome, LlmError>, f64) {
        let (result, cost) = self.call("priority", prompts::priority_prompt(email)).await;
        let outcome = result.map(|value| {
            let priority = str_field(&value, "priority")
                .map(|p| Priority::parse_lenient(&p))
                .unwrap_or_default();
            PriorityOutcome {
                priority,
                confidence: confidence_field(&value),
                reasoning: reasoning_field(&value),
            }
        });
        (outcome, cost)
    }

    /// Run all four passes concurrently and merge. Individual failures
    /// degrade to neutral defaults; only all four failing is an error.
    pub async fn analyze(
        &self,
        email: &EmailMessage,
        rule_category: Category,
        facts: &ExtractedFacts,
        properties: &[Property],
    ) -> Result<AnalysisResult, AnalysisError> {
        let (categorization, tasks, property, priority) = tokio::join!(
            self.categorize_pass(email),
            self.task_pass(email, rule_category),
            self.property_pass(email, facts, properties),
            self.priority_pass(email),
        );

        let mut failures = 0usize;
        let mut last_error = String::new();
        let mut note_failure = |err: &LlmError| {
            failures += 1;
            last_error = err.to_string();
        };

        let estimated_cost_usd = categorization.1 + tasks.1 + property.1 + priority.1;

        let categorization = categorization.0.unwrap_or_else(|err| {
            note_failure(&err);
            CategorizationOutcome::degraded()
        });
        let tasks = tasks.0.unwrap_or_else(|err| {
            note_failure(&err);
            TaskExtractionOutcome::degraded()
        });
        let property_match = property.0.unwrap_or_else(|err| {
            note_failure(&err);
            PropertyMatch::none("property matching pass failed")
        });
        let priority = priority.0.unwrap_or_else(|err| {
            note_failure(&err);
            PriorityOutcome::degraded()
        });

        if failures == 4 {
            return Err(AnalysisError::AllPassesFailed(last_error));
        }

        let overall_confidence = combine_confidences(&[
            categorization.confidence,
            tasks.confidence,
            property_match.confidence,
            priority.confidence,
        ]);

        Ok(AnalysisResult {
            categorization,
            priority,
            tasks,
            property_match,
            overall_confidence,
            estimated_cost_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn suggestion(confidence: f64) -> TaskSuggestion {
        TaskSuggestion {
            title: "Prepare for inspection".into(),
            description: String::new(),
            task_type: TaskType::InspectionAnnual,
            priority: Priority::High,
            due_date: None,
            confidence,
        }
    }

    #[test]
    fn confidence_merge_excludes_zeros() {
        let merged = combine_confidences(&[0.9, 0.0, 0.8, 0.0]);
        assert!((merged - 0.85).abs() < 1e-9);
        assert_eq!(combine_confidences(&[0.0, 0.0]), 0.0);
        assert_eq!(combine_confidences(&[]), 0.0);
        assert_eq!(combine_confidences(&[1.0]), 1.0);
    }

    #[test]
    fn auto_create_requires_both_gates() {
        // Overall gate fails even with a confident task.
        assert!(select_auto_create_tasks(0.79, &[suggestion(0.95)]).is_empty());
        // Per-task gate fails even with confident overall.
        assert!(select_auto_create_tasks(0.85, &[suggestion(0.6), suggestion(0.7)]).is_empty());
        // Only the qualifying task comes through.
        let picked = select_auto_create_tasks(0.9, &[suggestion(0.85), suggestion(0.5)]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].confidence, 0.85);
    }

    #[test]
    fn task_suggestion_parsing_is_lenient() {
        let parsed = parse_task_suggestion(&json!({
            "title": "Pay bill",
            "task_type": "utility_payment",
            "priority": "Critical",
            "due_date": "2025-04-09",
            "confidence": 0.9,
        }))
        .unwrap();
        assert_eq!(parsed.task_type, TaskType::UtilityPayment);
        assert_eq!(parsed.priority, Priority::Urgent);
        assert_eq!(
            parsed.due_date,
            Some(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap())
        );

        let parsed = parse_task_suggestion(&json!({
            "title": "Odd",
            "task_type": "not_a_type",
            "due_date": "tomorrow",
        }))
        .unwrap();
        assert_eq!(parsed.task_type, TaskType::Other);
        assert_eq!(parsed.priority, Priority::Normal);
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.confidence, 0.0);

        assert!(parse_task_suggestion(&json!({"task_type": "utility_payment"})).is_none());
        assert!(parse_task_suggestion(&json!({"title": "  "})).is_none());
    }

    /// Stub model that dispatches on marker text in each pass's prompt.
    struct StubModel {
        fail_all: bool,
        fail_categorization: bool,
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError> {
            if self.fail_all {
                return Err(LlmError::EmptyResponse);
            }
            let prompt = &request.user_prompt;
            if prompt.starts_with("Categorize") {
                if self.fail_categorization {
                    return Err(LlmError::EmptyResponse);
                }
                Ok(json!({
                    "category": "inspection_confirmation",
                    "confidence": 0.9,
                    "reasoning": "inspection subject",
                }))
            } else if prompt.contains("\"tasks\"") {
                Ok(json!({
                    "tasks": [{
                        "title": "Prepare for MHA inspection",
                        "task_type": "inspection_reinspection",
                        "priority": "high",
                        "confidence": 0.85,
                    }],
                    "confidence": 0.8,
                    "reasoning": "clear inspection notice",
                }))
            } else if prompt.starts_with("Which property") {
                Ok(json!({
                    "property_address": "123 Oak Street",
                    "confidence": 0.9,
                    "reasoning": "address in body",
                }))
            } else {
                Ok(json!({
                    "priority": "high",
                    "confidence": 0.7,
                    "reasoning": "inspection deadline",
                }))
            }
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn email() -> EmailMessage {
        EmailMessage {
            subject: "MHA - Initial Reinspection Scheduled 04/10/2025".into(),
            sender_email: "inspection@mhatoday.org".into(),
            body_preview: Some("Inspection at 123 Oak Street".into()),
            ..EmailMessage::default()
        }
    }

    fn directory() -> Vec<Property> {
        vec![Property {
            id: Some(1),
            address: "123 Oak Street".into(),
            city: "Montgomery".into(),
            state: "AL".into(),
            zip_code: "36104".into(),
            ..Property::default()
        }]
    }

    #[tokio::test]
    async fn full_pass_merges_all_four_calls() {
        let engine = AnalysisEngine::new(StubModel {
            fail_all: false,
            fail_categorization: false,
        });
        let email = email();
        let facts = crate::extraction::extract_facts(&email.subject, email.body_preview_text());
        let result = engine
            .analyze(&email, Category::InspectionConfirmation, &facts, &directory())
            .await
            .unwrap();

        assert_eq!(result.categorization.category, Category::InspectionConfirmation);
        assert_eq!(result.property_match.property_id, Some(1));
        // The match carries the model's own confidence, not a fixed score.
        assert_eq!(result.property_match.confidence, 0.9);
        assert_eq!(result.tasks.tasks.len(), 1);
        // Mean of [0.9, 0.8, 0.9, 0.7].
        assert!((result.overall_confidence - 0.825).abs() < 1e-9);
        assert!(result.estimated_cost_usd > 0.0);
    }

    #[tokio::test]
    async fn single_failure_degrades_that_pass_only() {
        let engine = AnalysisEngine::new(StubModel {
            fail_all: false,
            fail_categorization: true,
        });
        let email = email();
        let facts = crate::extraction::extract_facts(&email.subject, email.body_preview_text());
        let result = engine
            .analyze(&email, Category::InspectionConfirmation, &facts, &directory())
            .await
            .unwrap();

        assert_eq!(result.categorization.category, Category::Unknown);
        assert_eq!(result.categorization.confidence, 0.0);
        // Rule baseline wins when the pass produced no signal.
        assert_eq!(
            result.effective_category(Category::InspectionConfirmation),
            Category::InspectionConfirmation
        );
        // Mean of [0.8, 0.9, 0.7]; the failed pass is excluded.
        assert!((result.overall_confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn all_failures_surface_as_error() {
        let engine = AnalysisEngine::new(StubModel {
            fail_all: true,
            fail_categorization: false,
        });
        let email = email();
        let facts = crate::extraction::extract_facts(&email.subject, email.body_preview_text());
        let result = engine
            .analyze(&email, Category::Other, &facts, &directory())
            .await;
        assert!(matches!(result, Err(AnalysisError::AllPassesFailed(_))));
    }
}
