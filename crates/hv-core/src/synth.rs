//! Task synthesis: turn a classified, fact-extracted email into zero or more
//! task drafts with titles, priorities and due dates.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::classify::{Category, Priority};
use crate::entities::{AuthorityKind, UtilityKind};
use crate::extraction::ExtractedFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    InspectionAnnual,
    InspectionInitial,
    InspectionReinspection,
    InspectionHqs,
    WorkOrder,
    Maintenance,
    UtilityPayment,
    Invoice,
    Compliance,
    Legal,
    Leasing,
    Financial,
    TenantCommunication,
    Certification,
    Renewal,
    Other,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::InspectionAnnual => "inspection_annual",
            TaskType::InspectionInitial => "inspection_initial",
            TaskType::InspectionReinspection => "inspection_reinspection",
            TaskType::InspectionHqs => "inspection_hqs",
            TaskType::WorkOrder => "work_order",
            TaskType::Maintenance => "maintenance",
            TaskType::UtilityPayment => "utility_payment",
            TaskType::Invoice => "invoice",
            TaskType::Compliance => "compliance",
            TaskType::Legal => "legal",
            TaskType::Leasing => "leasing",
            TaskType::Financial => "financial",
            TaskType::TenantCommunication => "tenant_communication",
            TaskType::Certification => "certification",
            TaskType::Renewal => "renewal",
            TaskType::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "inspection_annual" => Some(TaskType::InspectionAnnual),
            "inspection_initial" => Some(TaskType::InspectionInitial),
            "inspection_reinspection" => Some(TaskType::InspectionReinspection),
            "inspection_hqs" => Some(TaskType::InspectionHqs),
            "work_order" => Some(TaskType::WorkOrder),
            "maintenance" => Some(TaskType::Maintenance),
            "utility_payment" => Some(TaskType::UtilityPayment),
            "invoice" => Some(TaskType::Invoice),
            "compliance" => Some(TaskType::Compliance),
            "legal" => Some(TaskType::Legal),
            "leasing" => Some(TaskType::Leasing),
            "financial" => Some(TaskType::Financial),
            "tenant_communication" => Some(TaskType::TenantCommunication),
            "certification" => Some(TaskType::Certification),
            "renewal" => Some(TaskType::Renewal),
            "other" => Some(TaskType::Other),
            _ => None,
        }
    }

    pub fn is_inspection(&self) -> bool {
        matches!(
            self,
            TaskType::InspectionAnnual
                | TaskType::InspectionInitial
                | TaskType::InspectionReinspection
                | TaskType::InspectionHqs
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Manual,
    RuleEngine,
    AiAnalysis,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSource::Manual => "manual",
            TaskSource::RuleEngine => "rule_engine",
            TaskSource::AiAnalysis => "ai_analysis",
        }
    }
}

/// A task proposed by synthesis but not yet persisted. `due_date == None`
/// means "apply the per-type default at creation time".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub confidence: f64,
    pub property_id: Option<i64>,
    pub housing_authority_id: Option<i64>,
    pub utility_company: Option<UtilityKind>,
    pub source: TaskSource,
}

impl TaskDraft {
    pub fn due_date_or_default(&self, today: NaiveDate) -> NaiveDate {
        self.due_date
            .unwrap_or_else(|| default_due_date(self.task_type, today))
    }

    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_date_or_default(today) - today).num_days()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.days_until_due(today) < 0
    }

    /// Due within the next three days, inclusive of today.
    pub fn due_soon(&self, today: NaiveDate) -> bool {
        let days = self.days_until_due(today);
        (0..=3).contains(&days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedTasks {
    pub tasks: Vec<TaskDraft>,
    pub confidence: f64,
    pub reasoning: String,
}

impl SynthesizedTasks {
    pub fn empty(reason: &str) -> Self {
        SynthesizedTasks {
            tasks: Vec::new(),
            confidence: 0.0,
            reasoning: reason.to_string(),
        }
    }
}

/// Inputs assembled by the caller from classification, extraction and
/// matching output.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub category: Category,
    pub subject: &'a str,
    pub body_preview: &'a str,
    pub facts: &'a ExtractedFacts,
    pub authority: Option<AuthorityKind>,
    pub housing_authority_id: Option<i64>,
    pub utility: Option<UtilityKind>,
    pub property_id: Option<i64>,
    pub today: NaiveDate,
}

pub fn add_business_days(start: NaiveDate, days: i64) -> NaiveDate {
    let mut current = start;
    let mut remaining = days;
    while remaining > 0 {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    current
}

/// Fallback due date per task type, used when synthesis produced no explicit
/// date.
pub fn default_due_date(task_type: TaskType, today: NaiveDate) -> NaiveDate {
    match task_type {
        t if t.is_inspection() => today + Duration::days(2),
        TaskType::WorkOrder | TaskType::Maintenance => add_business_days(today, 5),
        TaskType::UtilityPayment | TaskType::Invoice | TaskType::Compliance | TaskType::Legal => {
            add_business_days(today, 1)
        }
        TaskType::Certification | TaskType::Renewal => today + Duration::days(14),
        _ => add_business_days(today, 3),
    }
}

/// Day-bucketed priority for a bill payment task.
pub fn utility_priority(days_until_due: Option<i64>) -> Priority {
    match days_until_due {
        Some(days) if days <= 2 => Priority::Urgent,
        Some(days) if days <= 7 => Priority::High,
        _ => Priority::Normal,
    }
}

/// Sub-classifier for inspection emails. Keyword checks run in order against
/// the lowercased subject; nothing recognizable falls back to an annual
/// inspection.
pub fn detect_inspection_task_type(subject: &str) -> TaskType {
    let lower = subject.to_lowercase();
    if lower.contains("annual") {
        TaskType::InspectionAnnual
    } else if lower.contains("initial") && !lower.contains("reinspection") {
        TaskType::InspectionInitial
    } else if lower.contains("reinspection") {
        TaskType::InspectionReinspection
    } else if lower.contains("hqs") {
        TaskType::InspectionHqs
    } else {
        TaskType::InspectionAnnual
    }
}

fn inspection_task(input: &SynthesisInput) -> TaskDraft {
    let authority_name = input
        .authority
        .map(|a| a.display_name())
        .unwrap_or("Housing Authority");
    let priority = input
        .authority
        .map(|a| a.priority())
        .unwrap_or(Priority::High);
    let due_date = input
        .facts
        .inspection_date
        .map(|date| date - Duration::days(1));

    let description = match input.facts.inspection_date {
        Some(date) => format!(
            "Inspection scheduled for {}. Subject: {}",
            date.format("%m/%d/%Y"),
            input.subject
        ),
        None => format!("Inspection notice received. Subject: {}", input.subject),
    };

    TaskDraft {
        title: format!("Prepare for {authority_name} Inspection"),
        description,
        task_type: detect_inspection_task_type(input.subject),
        priority,
        due_date,
        confidence: 0.9,
        property_id: input.property_id,
        housing_authority_id: input.housing_authority_id,
        utility_company: None,
        source: TaskSource::RuleEngine,
    }
}

fn utility_task(input: &SynthesisInput) -> TaskDraft {
    let company_name = input
        .utility
        .map(|u| u.display_name())
        .unwrap_or("Utility");
    let bill = &input.facts.bill;
    let days_until_due = bill
        .due_date
        .map(|due| (due - input.today).num_days());
    let due_date = bill.due_date.map(|due| due - Duration::days(1));

    let mut description = format!("Utility bill from {company_name}.");
    if let Some(amount) = bill.amount {
        description.push_str(&format!(" Amount: ${amount:.2}."));
    }
    if let Some(due) = bill.due_date {
        description.push_str(&format!(" Due: {}.", due.format("%m/%d/%Y")));
    }
    if let Some(account) = bill.account_number.as_deref() {
        description.push_str(&format!(" Account: {account}."));
    }

    TaskDraft {
        title: format!("Pay {company_name} Bill"),
        description,
        task_type: TaskType::UtilityPayment,
        priority: utility_priority(days_until_due),
        due_date,
        confidence: 0.85,
        property_id: input.property_id,
        housing_authority_id: None,
        utility_company: input.utility,
        source: TaskSource::RuleEngine,
    }
}

fn work_order_task(input: &SynthesisInput) -> TaskDraft {
    TaskDraft {
        title: "Review Work Order Update".to_string(),
        description: format!("Work order update received. Subject: {}", input.subject),
        task_type: TaskType::WorkOrder,
        priority: Priority::Normal,
        due_date: Some(input.today + Duration::days(1)),
        confidence: 0.7,
        property_id: input.property_id,
        housing_authority_id: None,
        utility_company: None,
        source: TaskSource::RuleEngine,
    }
}

fn rfta_task(input: &SynthesisInput) -> TaskDraft {
    TaskDraft {
        title: "Review RFTA Completion".to_string(),
        description: format!("RFTA completion notice. Subject: {}", input.subject),
        task_type: TaskType::InspectionReinspection,
        priority: Priority::High,
        due_date: Some(input.today + Duration::days(2)),
        confidence: 0.8,
        property_id: input.property_id,
        housing_authority_id: input.housing_authority_id,
        utility_company: None,
        source: TaskSource::RuleEngine,
    }
}

/// Category-driven task synthesis. Categories without a template produce no
/// tasks, which is a valid outcome rather than an error.
pub fn synthesize_tasks(input: &SynthesisInput) -> SynthesizedTasks {
    let draft = match input.category {
        Category::InspectionConfirmation => Some(inspection_task(input)),
        Category::UtilityBill => {
            // A bill without a recognized company is not actionable.
            if input.utility.is_none() {
                return SynthesizedTasks::empty("no utility info found");
            }
            Some(utility_task(input))
        }
        Category::WorkOrderUpdate => Some(work_order_task(input)),
        Category::RftaCompletion => Some(rfta_task(input)),
        _ => None,
    };

    match draft {
        Some(task) => {
            let confidence = task.confidence;
            let reasoning = format!(
                "{} email produced task \"{}\"",
                input.category.as_str(),
                task.title
            );
            SynthesizedTasks {
                tasks: vec![task],
                confidence,
                reasoning,
            }
        }
        None => SynthesizedTasks::empty(&format!(
            "no task template for category {}",
            input.category.as_str()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::extract_facts;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input<'a>(
        category: Category,
        subject: &'a str,
        facts: &'a ExtractedFacts,
        authority: Option<AuthorityKind>,
        utility: Option<UtilityKind>,
    ) -> SynthesisInput<'a> {
        SynthesisInput {
            category,
            subject,
            body_preview: "",
            facts,
            authority,
            housing_authority_id: authority.map(|_| 11),
            utility,
            property_id: Some(7),
            today: date(2025, 4, 1),
        }
    }

    #[test]
    fn mha_reinspection_end_to_end() {
        let subject = "MHA - Initial Reinspection Scheduled 04/10/2025";
        let facts = extract_facts(subject, "");
        assert_eq!(facts.inspection_date, Some(date(2025, 4, 10)));

        let result = synthesize_tasks(&input(
            Category::InspectionConfirmation,
            subject,
            &facts,
            Some(AuthorityKind::Mha),
            None,
        ));
        assert_eq!(result.tasks.len(), 1);
        let task = &result.tasks[0];
        assert_eq!(task.title, "Prepare for Montgomery Housing Authority Inspection");
        assert_eq!(task.task_type, TaskType::InspectionReinspection);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(date(2025, 4, 9)));
        assert_eq!(task.confidence, 0.9);
        assert_eq!(task.property_id, Some(7));
        assert_eq!(task.housing_authority_id, Some(11));
        assert_eq!(task.utility_company, None);
    }

    #[test]
    fn inspection_without_date_leaves_due_unset() {
        let facts = ExtractedFacts::default();
        let result = synthesize_tasks(&input(
            Category::InspectionConfirmation,
            "HQS Inspection",
            &facts,
            Some(AuthorityKind::Hqs),
            None,
        ));
        let task = &result.tasks[0];
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.task_type, TaskType::InspectionHqs);
        // Default kicks in at creation time: inspections fall due in 2 days.
        assert_eq!(task.due_date_or_default(date(2025, 4, 1)), date(2025, 4, 3));
    }

    #[test]
    fn inspection_sub_classifier_order() {
        assert_eq!(detect_inspection_task_type("Annual Inspection"), TaskType::InspectionAnnual);
        assert_eq!(detect_inspection_task_type("Initial Inspection"), TaskType::InspectionInitial);
        assert_eq!(
            detect_inspection_task_type("Initial Reinspection"),
            TaskType::InspectionReinspection
        );
        assert_eq!(detect_inspection_task_type("HQS visit"), TaskType::InspectionHqs);
        // Unrecognized subjects fall back to annual, even maintenance-looking ones.
        assert_eq!(
            detect_inspection_task_type("work order follow-up"),
            TaskType::InspectionAnnual
        );
        assert_eq!(detect_inspection_task_type("Inspection"), TaskType::InspectionAnnual);
    }

    #[test]
    fn utility_task_uses_day_bucketed_priority() {
        let subject = "Your bill";
        let facts = extract_facts(subject, "Amount Due: $125.50 Due Date: 04/01/2025");
        let result = synthesize_tasks(&input(
            Category::UtilityBill,
            subject,
            &facts,
            None,
            Some(UtilityKind::AlabamaPower),
        ));
        let task = &result.tasks[0];
        assert_eq!(task.title, "Pay Alabama Power Bill");
        assert_eq!(task.task_type, TaskType::UtilityPayment);
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.due_date, Some(date(2025, 3, 31)));
        assert_eq!(task.confidence, 0.85);
        assert_eq!(task.utility_company, Some(UtilityKind::AlabamaPower));
        assert!(task.description.contains("$125.50"));
    }

    #[test]
    fn utility_bill_without_company_yields_no_tasks() {
        let facts = extract_facts("Your bill", "Amount Due: $125.50 Due Date: 04/01/2025");
        let result = synthesize_tasks(&input(Category::UtilityBill, "Your bill", &facts, None, None));
        assert!(result.tasks.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.reasoning, "no utility info found");
    }

    #[test]
    fn utility_priority_schedule() {
        assert_eq!(utility_priority(Some(-3)), Priority::Urgent);
        assert_eq!(utility_priority(Some(0)), Priority::Urgent);
        assert_eq!(utility_priority(Some(2)), Priority::Urgent);
        assert_eq!(utility_priority(Some(3)), Priority::High);
        assert_eq!(utility_priority(Some(5)), Priority::High);
        assert_eq!(utility_priority(Some(7)), Priority::High);
        assert_eq!(utility_priority(Some(10)), Priority::Normal);
        assert_eq!(utility_priority(None), Priority::Normal);
    }

    #[test]
    fn work_order_and_rfta_templates() {
        let facts = ExtractedFacts::default();
        let result = synthesize_tasks(&input(
            Category::WorkOrderUpdate,
            "Work Order #12 Completed",
            &facts,
            None,
            None,
        ));
        let task = &result.tasks[0];
        assert_eq!(task.title, "Review Work Order Update");
        assert_eq!(task.due_date, Some(date(2025, 4, 2)));
        assert_eq!(task.confidence, 0.7);

        let result = synthesize_tasks(&input(
            Category::RftaCompletion,
            "RFTA completed",
            &facts,
            None,
            None,
        ));
        let task = &result.tasks[0];
        assert_eq!(task.title, "Review RFTA Completion");
        assert_eq!(task.task_type, TaskType::InspectionReinspection);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(date(2025, 4, 3)));
        assert_eq!(task.confidence, 0.8);
    }

    #[test]
    fn categories_without_templates_produce_no_tasks() {
        let facts = ExtractedFacts::default();
        for category in [Category::TenantCommunication, Category::Other, Category::Unknown] {
            let result = synthesize_tasks(&input(category, "subject", &facts, None, None));
            assert!(result.tasks.is_empty());
            assert_eq!(result.confidence, 0.0);
        }
    }

    #[test]
    fn due_date_predicates() {
        let today = date(2025, 4, 1);
        let mut draft = TaskDraft {
            title: "t".into(),
            description: String::new(),
            task_type: TaskType::UtilityPayment,
            priority: Priority::Normal,
            due_date: Some(date(2025, 3, 30)),
            confidence: 0.5,
            property_id: None,
            housing_authority_id: None,
            utility_company: None,
            source: TaskSource::Manual,
        };
        assert!(draft.is_overdue(today));
        assert!(!draft.due_soon(today));
        assert_eq!(draft.days_until_due(today), -2);

        draft.due_date = Some(date(2025, 4, 3));
        assert!(draft.due_soon(today));
        assert!(!draft.is_overdue(today));

        draft.due_date = Some(date(2025, 4, 20));
        assert!(!draft.due_soon(today));
    }

    #[test]
    fn business_day_arithmetic_skips_weekends() {
        // 2025-04-04 is a Friday.
        let friday = date(2025, 4, 4);
        assert_eq!(add_business_days(friday, 1), date(2025, 4, 7));
        assert_eq!(add_business_days(friday, 5), date(2025, 4, 11));
        assert_eq!(add_business_days(friday, 0), friday);
    }

    #[test]
    fn default_due_date_table() {
        // 2025-04-01 is a Tuesday.
        let today = date(2025, 4, 1);
        assert_eq!(default_due_date(TaskType::InspectionAnnual, today), date(2025, 4, 3));
        assert_eq!(default_due_date(TaskType::WorkOrder, today), date(2025, 4, 8));
        assert_eq!(default_due_date(TaskType::Maintenance, today), date(2025, 4, 8));
        assert_eq!(default_due_date(TaskType::UtilityPayment, today), date(2025, 4, 2));
        assert_eq!(default_due_date(TaskType::Compliance, today), date(2025, 4, 2));
        assert_eq!(default_due_date(TaskType::Certification, today), date(2025, 4, 15));
        assert_eq!(default_due_date(TaskType::Leasing, today), date(2025, 4, 4));
        assert_eq!(default_due_date(TaskType::TenantCommunication, today), date(2025, 4, 4));
        assert_eq!(default_due_date(TaskType::Other, today), date(2025, 4, 4));
    }
}
