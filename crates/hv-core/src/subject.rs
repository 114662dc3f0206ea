use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static REPLY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:(?:re|fw|fwd)\s*:\s*)+").unwrap());

/// Strip stacked reply/forward prefixes from a subject line.
///
/// Never returns an empty string for non-empty input: if stripping leaves
/// nothing (the subject was only prefixes), the trimmed original is returned.
pub fn normalize_subject(subject: &str) -> String {
    let original = subject.trim();
    if original.is_empty() {
        return String::new();
    }

    let stripped = REPLY_PREFIX.replace(original, "");
    let stripped = stripped.trim();

    if stripped.is_empty() {
        original.to_string()
    } else {
        stripped.to_string()
    }
}

/// Dedup key for a subject: first 16 hex chars of the SHA-256 of the
/// normalized subject. Stored with each email row so repeated syncs of the
/// same thread can be spotted cheaply.
pub fn subject_hash(subject: &str) -> String {
    let normalized = normalize_subject(subject);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(16);
    hex
}
