pub mod address;
pub mod analysis;
pub mod classify;
pub mod db;
pub mod entities;
pub mod extraction;
pub mod llm;
pub mod logging;
pub mod matching;
pub mod queue;
pub mod schema;
pub mod subject;
pub mod synth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use classify::{Category, Priority};

/// Inbound email as synced from the mail provider. One row per provider
/// message id per organization; classification and AI analysis mutate
/// category / priority / confidence / extracted data, nothing else does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailMessage {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub email_account_id: i64,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub body_preview: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub priority_level: Priority,
    pub confidence_score: Option<f64>,
    pub extracted_data: Option<Value>,
    pub requires_action: bool,
    pub is_read: bool,
    pub is_important: bool,
    pub property_id: Option<i64>,
}

impl EmailMessage {
    pub fn sender_display_name(&self) -> &str {
        self.sender_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.sender_email)
    }

    pub fn body_preview_text(&self) -> &str {
        self.body_preview.as_deref().unwrap_or("")
    }

    /// An email counts as processed once the rule engine or the model has
    /// assigned a category. Callers must check this before re-classifying.
    pub fn processed(&self) -> bool {
        self.category.is_some()
    }

    pub fn high_confidence(&self) -> bool {
        self.confidence_score.map(|c| c >= 0.8).unwrap_or(false)
    }

    pub fn needs_review(&self) -> bool {
        self.confidence_score.map(|c| c < 0.7).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStatus {
    Vacant,
    Occupied,
    Maintenance,
    Offline,
}

impl OccupancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyStatus::Vacant => "vacant",
            OccupancyStatus::Occupied => "occupied",
            OccupancyStatus::Maintenance => "maintenance",
            OccupancyStatus::Offline => "offline",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "vacant" => Some(OccupancyStatus::Vacant),
            "occupied" => Some(OccupancyStatus::Occupied),
            "maintenance" => Some(OccupancyStatus::Maintenance),
            "offline" => Some(OccupancyStatus::Offline),
            _ => None,
        }
    }
}

/// Property directory entry. Read-only from this pipeline's perspective;
/// the property-management flows that write it live elsewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Property {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub address: String,
    pub unit_number: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub status: Option<OccupancyStatus>,
    pub tenant_name: Option<String>,
    pub rent_amount: Option<f64>,
    pub housing_authority_id: Option<i64>,
}

impl Property {
    pub fn full_address(&self) -> String {
        let mut parts: Vec<&str> = vec![self.address.as_str()];
        if let Some(unit) = self.unit_number.as_deref() {
            if !unit.is_empty() {
                parts.push(unit);
            }
        }
        parts.push(self.city.as_str());
        parts.push(self.state.as_str());
        parts.push(self.zip_code.as_str());
        parts.retain(|p| !p.is_empty());
        parts.join(", ")
    }
}
