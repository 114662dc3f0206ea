use std::collections::HashSet;

/// Street-suffix contractions applied during normalization. Long forms map to
/// the short form so "Oak Street" and "Oak St" normalize identically.
const SUFFIX_TABLE: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("way", "way"),
    ("circle", "cir"),
    ("court", "ct"),
    ("boulevard", "blvd"),
    ("place", "pl"),
];

fn contract_suffix(token: &str) -> &str {
    for (long, short) in SUFFIX_TABLE {
        if token == *long {
            return short;
        }
    }
    token
}

/// Canonicalize a free-text address for fuzzy comparison: lowercase, strip
/// `.` `,` `#`, collapse whitespace, contract street suffixes. Total function;
/// empty input yields an empty string.
pub fn normalize(address: &str) -> String {
    let cleaned: String = address
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '#'))
        .collect();

    cleaned
        .split_whitespace()
        .map(contract_suffix)
        .collect::<Vec<_>>()
        .join(" ")
}

fn leading_number(tokens: &[&str]) -> Option<String> {
    tokens
        .first()
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| t.to_string())
}

fn word_tokens<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    tokens
        .iter()
        .copied()
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Fuzzy address equivalence. True when one normalized string contains the
/// other, or when the leading street numbers match and the non-numeric token
/// sets overlap by at least 60% of the smaller set. Addresses with different
/// street numbers are never similar, whatever the street name says.
pub fn similar(a: &str, b: &str) -> bool {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }

    if na.contains(&nb) || nb.contains(&na) {
        return true;
    }

    let tokens_a: Vec<&str> = na.split(' ').collect();
    let tokens_b: Vec<&str> = nb.split(' ').collect();

    let (Some(number_a), Some(number_b)) = (leading_number(&tokens_a), leading_number(&tokens_b))
    else {
        return false;
    };
    if number_a != number_b {
        return false;
    }

    let words_a = word_tokens(&tokens_a);
    let words_b = word_tokens(&tokens_b);
    let min_len = words_a.len().min(words_b.len());
    if min_len == 0 {
        return false;
    }

    let set_a: HashSet<&str> = words_a.iter().copied().collect();
    let common = words_b.iter().filter(|w| set_a.contains(*w)).count();

    common as f64 >= min_len as f64 * 0.6
}
