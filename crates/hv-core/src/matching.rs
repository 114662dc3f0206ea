use serde::{Deserialize, Serialize};

use crate::address;
use crate::Property;

/// Outcome of trying to link an email to a property. `property_id == None`
/// means no link; confidence is then zero and the reasoning says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub property_id: Option<i64>,
    pub confidence: f64,
    pub reasoning: String,
    /// The address text that produced the match, for the audit trail.
    pub matched_text: Option<String>,
}

impl PropertyMatch {
    pub fn none(reason: &str) -> Self {
        PropertyMatch {
            property_id: None,
            confidence: 0.0,
            reasoning: reason.to_string(),
            matched_text: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.property_id.is_some()
    }
}

fn find_by_address<'a>(candidate: &str, properties: &'a [Property]) -> Option<&'a Property> {
    properties.iter().find(|property| {
        address::similar(candidate, &property.address)
            || address::similar(candidate, &property.full_address())
    })
}

/// Link an email to a property from the organization's directory.
///
/// The model-suggested address is tried first and scores at the model's own
/// confidence; a regex-extracted fallback scores a fixed 0.8. Both go through
/// the same fuzzy comparison against each property's street address and full
/// address.
pub fn match_property(
    ai_suggested_address: Option<&str>,
    ai_confidence: f64,
    extracted_address: Option<&str>,
    properties: &[Property],
) -> PropertyMatch {
    if properties.is_empty() {
        return PropertyMatch::none("no properties in directory");
    }

    let candidates = [
        (ai_suggested_address, ai_confidence, "model-suggested address"),
        (extracted_address, 0.8, "extracted address"),
    ];

    for (candidate, confidence, source) in candidates {
        let Some(text) = candidate.map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        if let Some(property) = find_by_address(text, properties) {
            return PropertyMatch {
                property_id: property.id,
                confidence,
                reasoning: format!("{source} matched {}", property.address),
                matched_text: Some(text.to_string()),
            };
        }
    }

    PropertyMatch::none("no address matched the property directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<Property> {
        vec![
            Property {
                id: Some(1),
                address: "123 Oak Street".into(),
                city: "Montgomery".into(),
                state: "AL".into(),
                zip_code: "36104".into(),
                ..Property::default()
            },
            Property {
                id: Some(2),
                address: "456 Elm Avenue".into(),
                city: "Montgomery".into(),
                state: "AL".into(),
                zip_code: "36105".into(),
                ..Property::default()
            },
        ]
    }

    #[test]
    fn ai_suggestion_carries_model_confidence() {
        let result = match_property(Some("123 Oak St"), 0.95, None, &directory());
        assert_eq!(result.property_id, Some(1));
        assert_eq!(result.confidence, 0.95);

        let result = match_property(Some("123 Oak St"), 0.4, None, &directory());
        assert_eq!(result.confidence, 0.4);

        let result = match_property(None, 0.0, Some("123 Oak St"), &directory());
        assert_eq!(result.property_id, Some(1));
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn ai_suggestion_is_tried_first() {
        let result = match_property(Some("456 Elm Ave"), 0.9, Some("123 Oak St"), &directory());
        assert_eq!(result.property_id, Some(2));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.matched_text.as_deref(), Some("456 Elm Ave"));
    }

    #[test]
    fn falls_through_unmatched_suggestion() {
        let result =
            match_property(Some("999 Nowhere Blvd"), 0.9, Some("123 Oak Street"), &directory());
        assert_eq!(result.property_id, Some(1));
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn matches_against_full_address_too() {
        let result =
            match_property(Some("123 Oak Street, Montgomery, AL 36104"), 0.9, None, &directory());
        assert_eq!(result.property_id, Some(1));
    }

    #[test]
    fn no_candidates_or_empty_directory_yield_none() {
        let result = match_property(None, 0.0, None, &directory());
        assert!(!result.is_match());
        assert_eq!(result.confidence, 0.0);

        let result = match_property(Some("123 Oak Street"), 0.9, None, &[]);
        assert!(!result.is_match());

        let result = match_property(Some("  "), 0.9, Some(""), &directory());
        assert!(!result.is_match());
    }
}
