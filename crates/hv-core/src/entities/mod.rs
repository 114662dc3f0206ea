//! Detection of known counterparties: housing authorities and utility
//! companies. Trigger tables are ordered and the first hit wins.

pub mod housing_authority;
pub mod utility;

pub use housing_authority::{AuthorityKind, AuthorityProfile};
pub use utility::{UtilityCompany, UtilityKind, UtilityType};

/// Stateless detector over the built-in trigger tables. A unit struct today;
/// it exists as a value so per-organization overrides can be layered in
/// without touching call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityDetector;

impl EntityDetector {
    /// Housing-authority triggers are matched case-sensitively: `MHA -` is a
    /// branded subject prefix, not the English word, and lowering it would
    /// catch unrelated text.
    pub fn detect_housing_authority(
        &self,
        sender_email: &str,
        subject: &str,
    ) -> Option<AuthorityKind> {
        housing_authority::detect(sender_email, subject)
    }

    /// Utility senders and subjects are matched case-insensitively.
    pub fn detect_utility(&self, sender_email: &str, subject: &str) -> Option<UtilityKind> {
        utility::detect(sender_email, subject)
    }
}
