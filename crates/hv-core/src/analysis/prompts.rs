//! Prompt construction for the four analysis passes. Every prompt demands a
//! JSON object back; the shapes are parsed in the engine.

use crate::classify::Category;
use crate::EmailMessage;
use crate::Property;

pub const SYSTEM_PROMPT: &str = "You are an assistant for a property management \
company. You analyze incoming emails about rental properties, housing authority \
inspections, utility bills and maintenance. Always respond with a single JSON \
object and nothing else.";

fn email_block(email: &EmailMessage) -> String {
    format!(
        "Email:\n  From: {} <{}>\n  Subject: {}\n  Body: {}",
        email.sender_display_name(),
        email.sender_email,
        email.subject,
        email.body_preview_text(),
    )
}

pub fn categorization_prompt(email: &EmailMessage) -> String {
    format!(
        "Categorize this email into exactly one of: inspection_confirmation, \
utility_bill, work_order_update, tenant_communication, rfta_completion, \
rental_increase, contractor_communication, other.\n\n{}\n\n\
Respond with JSON: {{\"category\": \"...\", \"confidence\": 0.0-1.0, \
\"reasoning\": \"...\"}}",
        email_block(email)
    )
}

/// Task-extraction prompt. When the rule engine already pinned down a
/// Section 8 workflow category, the prompt narrows to that workflow's task
/// shapes instead of asking open-endedly.
pub fn task_extraction_prompt(email: &EmailMessage, rule_category: Category) -> String {
    let guidance = match rule_category {
        Category::InspectionConfirmation => {
            "This is a housing authority inspection notice. Suggest preparation \
tasks. Valid task types: inspection_annual, inspection_initial, \
inspection_reinspection, inspection_hqs."
        }
        Category::UtilityBill => {
            "This is a utility bill. Suggest payment tasks. Valid task types: \
utility_payment, invoice."
        }
        Category::WorkOrderUpdate => {
            "This is a work order update. Suggest follow-up tasks. Valid task \
types: work_order, maintenance."
        }
        Category::RftaCompletion => {
            "This is an RFTA completion notice. Suggest review tasks. Valid task \
types: inspection_reinspection, compliance."
        }
        _ => {
            "Suggest any actionable tasks this email implies. Valid task types: \
inspection_annual, inspection_initial, inspection_reinspection, \
inspection_hqs, work_order, maintenance, utility_payment, invoice, \
compliance, legal, leasing, financial, tenant_communication, \
certification, renewal, other."
        }
    };

    format!(
        "{}\n\n{}\n\nRespond with JSON: {{\"tasks\": [{{\"title\": \"...\", \
\"description\": \"...\", \"task_type\": \"...\", \"priority\": \
\"low|normal|high|urgent\", \"due_date\": \"YYYY-MM-DD or null\", \
\"confidence\": 0.0-1.0}}], \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}",
        guidance,
        email_block(email)
    )
}

pub fn property_matching_prompt(email: &EmailMessage, properties: &[Property]) -> String {
    let directory: Vec<String> = properties
        .iter()
        .map(|p| format!("  id={}: {}", p.id.unwrap_or(0), p.full_address()))
        .collect();

    format!(
        "Which property from this directory does the email refer to, if any?\n\n\
Properties:\n{}\n\n{}\n\nRespond with JSON: {{\"property_address\": \
\"the address text found in the email or null\", \"confidence\": 0.0-1.0, \
\"reasoning\": \"...\"}}",
        directory.join("\n"),
        email_block(email)
    )
}

pub fn priority_prompt(email: &EmailMessage) -> String {
    format!(
        "Assess how urgent this email is for a property manager. Consider \
deadlines, inspection dates and payment due dates.\n\n{}\n\n\
Respond with JSON: {{\"priority\": \"low|normal|high|urgent\", \
\"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}",
        email_block(email)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> EmailMessage {
        EmailMessage {
            subject: "MHA - Annual Inspection".into(),
            sender_email: "inspection@mhatoday.org".into(),
            body_preview: Some("scheduled for 04/10/2025".into()),
            ..EmailMessage::default()
        }
    }

    #[test]
    fn prompts_embed_email_fields() {
        let prompt = categorization_prompt(&email());
        assert!(prompt.contains("MHA - Annual Inspection"));
        assert!(prompt.contains("inspection@mhatoday.org"));
        assert!(prompt.contains("inspection_confirmation"));
    }

    #[test]
    fn task_prompt_narrows_for_known_categories() {
        let inspection = task_extraction_prompt(&email(), Category::InspectionConfirmation);
        assert!(inspection.contains("inspection notice"));
        assert!(!inspection.contains("legal"));

        let open = task_extraction_prompt(&email(), Category::Other);
        assert!(open.contains("legal"));
    }

    #[test]
    fn property_prompt_lists_directory() {
        let properties = vec![Property {
            id: Some(4),
            address: "123 Oak Street".into(),
            city: "Montgomery".into(),
            state: "AL".into(),
            zip_code: "36104".into(),
            ..Property::default()
        }];
        let prompt = property_matching_prompt(&email(), &properties);
        assert!(prompt.contains("id=4: 123 Oak Street, Montgomery, AL, 36104"));
    }
}
