use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entities::EntityDetector;
use crate::extraction::extract_bill_info;

/// Closed category set for an inbound email. `Unknown` is only ever produced
/// by a degraded model pass, never by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InspectionConfirmation,
    UtilityBill,
    WorkOrderUpdate,
    TenantCommunication,
    RftaCompletion,
    RentalIncrease,
    ContractorCommunication,
    Other,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::InspectionConfirmation => "inspection_confirmation",
            Category::UtilityBill => "utility_bill",
            Category::WorkOrderUpdate => "work_order_update",
            Category::TenantCommunication => "tenant_communication",
            Category::RftaCompletion => "rfta_completion",
            Category::RentalIncrease => "rental_increase",
            Category::ContractorCommunication => "contractor_communication",
            Category::Other => "other",
            Category::Unknown => "unknown",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "inspection_confirmation" => Some(Category::InspectionConfirmation),
            "utility_bill" => Some(Category::UtilityBill),
            "work_order_update" => Some(Category::WorkOrderUpdate),
            "tenant_communication" => Some(Category::TenantCommunication),
            "rfta_completion" => Some(Category::RftaCompletion),
            "rental_increase" => Some(Category::RentalIncrease),
            "contractor_communication" => Some(Category::ContractorCommunication),
            "other" => Some(Category::Other),
            "unknown" => Some(Category::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }

    /// Lenient parse for model output, which likes to invent synonyms.
    pub fn parse_lenient(value: &str) -> Priority {
        match value.trim().to_lowercase().as_str() {
            "urgent" | "critical" | "emergency" => Priority::Urgent,
            "high" => Priority::High,
            "low" | "minor" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub priority: Priority,
}

const INSPECTION_KEYWORDS: &[&str] = &[
    "inspection",
    "reinspection",
    "mha -",
    "hqs",
    "ghp",
    "initial reinspection",
    "annual inspection",
    "scheduled",
];

const UTILITY_KEYWORDS: &[&str] = &[
    "bill",
    "payment",
    "due",
    "statement",
    "utility",
    "alabama power",
    "american water",
    "spire",
    "enbridge",
];

const WORK_ORDER_KEYWORDS: &[&str] = &[
    "work order",
    "maintenance",
    "repair",
    "completed",
    "service request",
    "technician",
];

fn subject_has_any(subject_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| subject_lower.contains(k))
}

pub fn is_inspection_subject(subject: &str) -> bool {
    subject_has_any(&subject.to_lowercase(), INSPECTION_KEYWORDS)
}

pub fn is_utility_subject(subject: &str) -> bool {
    subject_has_any(&subject.to_lowercase(), UTILITY_KEYWORDS)
}

pub fn is_work_order_subject(subject: &str) -> bool {
    subject_has_any(&subject.to_lowercase(), WORK_ORDER_KEYWORDS)
}

pub fn is_rfta_subject(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    lower.contains("rfta") || lower.contains("request for tenant action")
}

pub fn is_rental_increase_subject(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    lower.contains("rent increase") || lower.contains("rental increase")
}

/// A bill due within three days makes a utility email urgent at triage time;
/// the synthesized payment task gets the finer-grained schedule instead.
fn utility_triage_priority(subject: &str, body_preview: &str, today: NaiveDate) -> Priority {
    let bill = extract_bill_info(subject, body_preview);
    match bill.due_date {
        Some(due) if due <= today + Duration::days(3) => Priority::Urgent,
        _ => Priority::Normal,
    }
}

/// Rule-based categorization. First matching branch wins, top to bottom, so
/// inspection keywords shadow utility keywords and so on. Total and
/// deterministic over (subject, body, sender); callers are responsible for
/// skipping emails that already carry a category.
pub fn classify(
    detector: &EntityDetector,
    subject: &str,
    body_preview: &str,
    sender_email: &str,
    today: NaiveDate,
) -> Classification {
    let subject_lower = subject.to_lowercase();

    if subject_has_any(&subject_lower, INSPECTION_KEYWORDS) {
        let priority = detector
            .detect_housing_authority(sender_email, subject)
            .map(|kind| kind.priority())
            .unwrap_or(Priority::High);
        return Classification {
            category: Category::InspectionConfirmation,
            priority,
        };
    }

    if subject_has_any(&subject_lower, UTILITY_KEYWORDS) {
        return Classification {
            category: Category::UtilityBill,
            priority: utility_triage_priority(subject, body_preview, today),
        };
    }

    if subject_has_any(&subject_lower, WORK_ORDER_KEYWORDS) {
        return Classification {
            category: Category::WorkOrderUpdate,
            priority: Priority::Normal,
        };
    }

    if is_rfta_subject(subject) {
        return Classification {
            category: Category::RftaCompletion,
            priority: Priority::High,
        };
    }

    if is_rental_increase_subject(subject) {
        return Classification {
            category: Category::RentalIncrease,
            priority: Priority::Normal,
        };
    }

    Classification {
        category: Category::Other,
        priority: Priority::Low,
    }
}
