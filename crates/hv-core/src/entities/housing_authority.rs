use serde::{Deserialize, Serialize};

use crate::classify::Priority;

/// Housing authorities we recognize by sender or subject. Each carries a
/// notice policy used when an inspection task is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityKind {
    Mha,
    Hqs,
    Ghp,
    /// Catch-all for authorities without a dedicated trigger row.
    Other,
}

/// Notice policy for one authority. Serialized as-is into the
/// `housing_authorities` row so downstream consumers see the policy that was
/// in force when the row was written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthorityProfile {
    pub display_name: &'static str,
    /// Days before the inspection date that the prep task falls due.
    pub notice_days: i64,
    pub priority: &'static str,
}

impl AuthorityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityKind::Mha => "mha",
            AuthorityKind::Hqs => "hqs",
            AuthorityKind::Ghp => "ghp",
            AuthorityKind::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "mha" => Some(AuthorityKind::Mha),
            "hqs" => Some(AuthorityKind::Hqs),
            "ghp" => Some(AuthorityKind::Ghp),
            "other" => Some(AuthorityKind::Other),
            _ => None,
        }
    }

    pub fn profile(&self) -> AuthorityProfile {
        match self {
            AuthorityKind::Mha => AuthorityProfile {
                display_name: "Montgomery Housing Authority",
                notice_days: 3,
                priority: "high",
            },
            AuthorityKind::Hqs => AuthorityProfile {
                display_name: "Housing Quality Standards",
                notice_days: 5,
                priority: "normal",
            },
            AuthorityKind::Ghp => AuthorityProfile {
                display_name: "Gilson Housing Partners",
                notice_days: 2,
                priority: "high",
            },
            AuthorityKind::Other => AuthorityProfile {
                display_name: "Housing Authority",
                notice_days: 3,
                priority: "normal",
            },
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.profile().display_name
    }

    pub fn notice_days(&self) -> i64 {
        self.profile().notice_days
    }

    pub fn priority(&self) -> Priority {
        Priority::from_str(self.profile().priority).unwrap_or(Priority::Normal)
    }
}

/// Ordered trigger table. Matching is case-sensitive on both subject and
/// sender; these are branded markers, not prose.
pub fn detect(sender_email: &str, subject: &str) -> Option<AuthorityKind> {
    if subject.contains("MHA -") || sender_email.contains("mhatoday") {
        return Some(AuthorityKind::Mha);
    }
    if subject.contains("HQS") || sender_email.contains("inspection@gilsonhousingpartners") {
        return Some(AuthorityKind::Hqs);
    }
    if subject.contains("GHP") || sender_email.contains("ghp") {
        return Some(AuthorityKind::Ghp);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_and_sender_triggers() {
        assert_eq!(detect("x@y.com", "MHA - Annual Inspection"), Some(AuthorityKind::Mha));
        assert_eq!(detect("alerts@mhatoday.org", "reminder"), Some(AuthorityKind::Mha));
        assert_eq!(detect("x@y.com", "HQS Inspection Scheduled"), Some(AuthorityKind::Hqs));
        assert_eq!(
            detect("inspection@gilsonhousingpartners.com", "heads up"),
            Some(AuthorityKind::Hqs)
        );
        assert_eq!(detect("notices@ghp.org", "update"), Some(AuthorityKind::Ghp));
        // No trigger row maps to the catch-all; an unrecognized authority
        // stays undetected rather than guessed.
        assert_eq!(detect("x@y.com", "Section 8 renewal"), None);
        assert_eq!(detect("x@y.com", "nothing relevant"), None);
    }

    #[test]
    fn triggers_are_case_sensitive() {
        assert_eq!(detect("x@y.com", "mha - annual inspection"), None);
        assert_eq!(detect("x@y.com", "hqs inspection"), None);
    }

    #[test]
    fn mha_wins_over_later_rows() {
        // Subject carries both markers; table order decides.
        assert_eq!(detect("x@y.com", "MHA - HQS Inspection"), Some(AuthorityKind::Mha));
    }

    #[test]
    fn profiles_carry_notice_policy() {
        assert_eq!(AuthorityKind::Mha.notice_days(), 3);
        assert_eq!(AuthorityKind::Mha.priority(), Priority::High);
        assert_eq!(AuthorityKind::Hqs.notice_days(), 5);
        assert_eq!(AuthorityKind::Hqs.priority(), Priority::Normal);
        assert_eq!(AuthorityKind::Ghp.notice_days(), 2);
        assert_eq!(AuthorityKind::Ghp.priority(), Priority::High);
        assert_eq!(AuthorityKind::Other.display_name(), "Housing Authority");
        assert_eq!(AuthorityKind::Other.notice_days(), 3);
        assert_eq!(AuthorityKind::Other.priority(), Priority::Normal);
    }

    #[test]
    fn kind_round_trips() {
        for kind in [
            AuthorityKind::Mha,
            AuthorityKind::Hqs,
            AuthorityKind::Ghp,
            AuthorityKind::Other,
        ] {
            assert_eq!(AuthorityKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
