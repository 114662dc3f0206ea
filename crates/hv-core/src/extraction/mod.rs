//! Regex-based fact extraction from email subject and body text.
//!
//! Everything in here is best-effort: extractors return `Option` and never
//! fail. Patterns are ordered most-specific first and the first match wins.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Dollar amounts, labeled forms before a bare `$` fallback. Labeled
    /// amounts may omit the cents; the bare fallback requires them so random
    /// whole-dollar figures in prose are not mistaken for a bill.
    static ref AMOUNT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(?:amount\s+due|total\s+due|balance\s+due|total\s+amount)\s*:?\s*\$?\s*([\d,]+(?:\.\d{1,2})?)").unwrap(),
        Regex::new(r"(?i)(?:amount|balance|total)\s*:?\s*\$\s*([\d,]+(?:\.\d{1,2})?)").unwrap(),
        Regex::new(r"\$\s*([\d,]+\.\d{2})").unwrap(),
    ];

    static ref DUE_DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)due\s+(?:date|by|on)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(?i)(?:payment|pay)\s+(?:due|by)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(?i)due\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
    ];

    static ref ACCOUNT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)account\s*(?:number|no\.?|#)\s*:?\s*([\d-]{4,})").unwrap(),
        Regex::new(r"(?i)acct\s*(?:#|:)?\s*([\d-]{4,})").unwrap(),
    ];

    static ref INSPECTION_DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(?:inspection|reinspection)\s+(?:is\s+)?(?:scheduled|set)\s+(?:for|on)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(?i)(?:scheduled|inspection)\s+(?:date|for|on)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(?i)(?:inspection|reinspection)[^\d]{0,40}(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(?i)(\d{1,2}/\d{1,2}/\d{2,4})[^\d\n]{0,40}(?:inspection|reinspection)").unwrap(),
        Regex::new(r"(?i)(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday),?\s+(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
    ];

    /// Street address with a recognized suffix, then a loose number-plus-words
    /// fallback for addresses written without one.
    static ref ADDRESS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(\d+\s+[A-Za-z][A-Za-z\s]*?(?:street|st|avenue|ave|road|rd|drive|dr|lane|ln|court|ct|circle|cir|boulevard|blvd|way|place|pl))\b").unwrap(),
        Regex::new(r"\b(\d{3,5}\s+[A-Za-z][A-Za-z\s]{2,30}?)\s*(?:,|\.|\n|$)").unwrap(),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillInfo {
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub account_number: Option<String>,
}

impl BillInfo {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.due_date.is_none() && self.account_number.is_none()
    }
}

/// Everything the rule engine could pull out of one email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFacts {
    pub property_address: Option<String>,
    pub inspection_date: Option<NaiveDate>,
    pub bill: BillInfo,
}

fn first_capture<'a>(patterns: &[Regex], text: &'a str) -> Option<&'a str> {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str());
            }
        }
    }
    None
}

/// Parse `MM/DD/YYYY` or `MM/DD/YY`, dispatching on the year-token length.
/// chrono's `%Y` happily accepts a two-digit year as the literal year 25, so
/// the format must be chosen up front. Rejects anything chrono considers an
/// invalid calendar date.
pub fn parse_slash_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let year_len = raw.rsplit('/').next()?.len();
    let format = if year_len <= 2 { "%m/%d/%y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(raw, format).ok()
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn titleize(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bill amount, due date and account number from subject + body. The two are
/// concatenated so a due date in the subject line still counts.
pub fn extract_bill_info(subject: &str, body: &str) -> BillInfo {
    let text = format!("{subject}\n{body}");
    BillInfo {
        amount: first_capture(&AMOUNT_PATTERNS, &text).and_then(parse_amount),
        due_date: first_capture(&DUE_DATE_PATTERNS, &text).and_then(parse_slash_date),
        account_number: first_capture(&ACCOUNT_PATTERNS, &text).map(|s| s.to_string()),
    }
}

pub fn extract_inspection_date(subject: &str, body: &str) -> Option<NaiveDate> {
    let text = format!("{subject}\n{body}");
    first_capture(&INSPECTION_DATE_PATTERNS, &text).and_then(parse_slash_date)
}

/// Pull a street address out of free text, titleized for display.
pub fn extract_property_address(text: &str) -> Option<String> {
    first_capture(&ADDRESS_PATTERNS, text).map(|m| titleize(m.trim()))
}

/// One pass over an email that runs every extractor.
pub fn extract_facts(subject: &str, body: &str) -> ExtractedFacts {
    let combined = format!("{subject}\n{body}");
    ExtractedFacts {
        property_address: extract_property_address(&combined),
        inspection_date: extract_inspection_date(subject, body),
        bill: extract_bill_info(subject, body),
    }
}
