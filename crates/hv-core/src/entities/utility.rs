use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityKind {
    AlabamaPower,
    AmericanWater,
    Spire,
    MontgomeryWaterWorks,
    Enbridge,
}

/// What service a provider bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityType {
    Electric,
    Gas,
    Water,
}

impl UtilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityType::Electric => "electric",
            UtilityType::Gas => "gas",
            UtilityType::Water => "water",
        }
    }
}

/// Static descriptor for one recognized utility provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilityCompany {
    pub kind: UtilityKind,
    pub display_name: &'static str,
    pub utility_type: UtilityType,
    /// Lowercase substrings matched against sender and subject.
    patterns: &'static [&'static str],
}

const UTILITY_COMPANIES: &[UtilityCompany] = &[
    UtilityCompany {
        kind: UtilityKind::AlabamaPower,
        display_name: "Alabama Power",
        utility_type: UtilityType::Electric,
        patterns: &["alabama power", "alabamapower"],
    },
    UtilityCompany {
        kind: UtilityKind::AmericanWater,
        display_name: "American Water",
        utility_type: UtilityType::Water,
        patterns: &["american water", "amwater"],
    },
    UtilityCompany {
        kind: UtilityKind::Spire,
        display_name: "Spire",
        utility_type: UtilityType::Gas,
        patterns: &["spire"],
    },
    UtilityCompany {
        kind: UtilityKind::MontgomeryWaterWorks,
        display_name: "Montgomery Water Works",
        utility_type: UtilityType::Water,
        patterns: &["montgomery water", "mgmwaterworks"],
    },
    UtilityCompany {
        kind: UtilityKind::Enbridge,
        display_name: "Enbridge",
        utility_type: UtilityType::Gas,
        patterns: &["enbridge"],
    },
];

impl UtilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityKind::AlabamaPower => "alabama_power",
            UtilityKind::AmericanWater => "american_water",
            UtilityKind::Spire => "spire",
            UtilityKind::MontgomeryWaterWorks => "montgomery_water_works",
            UtilityKind::Enbridge => "enbridge",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        UTILITY_COMPANIES
            .iter()
            .find(|c| c.kind.as_str() == value)
            .map(|c| c.kind)
    }

    pub fn display_name(&self) -> &'static str {
        UTILITY_COMPANIES
            .iter()
            .find(|c| c.kind == *self)
            .map(|c| c.display_name)
            .unwrap_or("Utility")
    }

    pub fn utility_type(&self) -> UtilityType {
        match self {
            UtilityKind::AlabamaPower => UtilityType::Electric,
            UtilityKind::AmericanWater | UtilityKind::MontgomeryWaterWorks => UtilityType::Water,
            UtilityKind::Spire | UtilityKind::Enbridge => UtilityType::Gas,
        }
    }
}

/// First company whose pattern appears in the sender address or subject,
/// compared in lowercase.
pub fn detect(sender_email: &str, subject: &str) -> Option<UtilityKind> {
    let sender = sender_email.to_lowercase();
    let subject = subject.to_lowercase();
    UTILITY_COMPANIES
        .iter()
        .find(|company| {
            company
                .patterns
                .iter()
                .any(|p| sender.contains(p) || subject.contains(p))
        })
        .map(|company| company.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_sender_domain() {
        assert_eq!(
            detect("billing@alabamapower.com", "Your bill is ready"),
            Some(UtilityKind::AlabamaPower)
        );
        assert_eq!(
            detect("noreply@amwater.com", "statement"),
            Some(UtilityKind::AmericanWater)
        );
    }

    #[test]
    fn detects_by_subject_case_insensitively() {
        assert_eq!(
            detect("billing@example.com", "SPIRE Energy Statement"),
            Some(UtilityKind::Spire)
        );
        assert_eq!(
            detect("x@y.com", "Montgomery Water payment due"),
            Some(UtilityKind::MontgomeryWaterWorks)
        );
        assert_eq!(detect("x@y.com", "Enbridge gas bill"), Some(UtilityKind::Enbridge));
    }

    #[test]
    fn unknown_sender_is_none() {
        assert_eq!(detect("billing@generic.com", "Your invoice"), None);
    }

    #[test]
    fn detects_montgomery_water_by_sender_domain() {
        assert_eq!(
            detect("ebill@mgmwaterworks.com", "Your water bill"),
            Some(UtilityKind::MontgomeryWaterWorks)
        );
    }

    #[test]
    fn display_names_and_round_trip() {
        assert_eq!(UtilityKind::AlabamaPower.display_name(), "Alabama Power");
        for company in UTILITY_COMPANIES {
            assert_eq!(UtilityKind::from_str(company.kind.as_str()), Some(company.kind));
        }
    }

    #[test]
    fn service_types_match_the_table() {
        for company in UTILITY_COMPANIES {
            assert_eq!(company.kind.utility_type(), company.utility_type);
        }
        assert_eq!(UtilityKind::AlabamaPower.utility_type(), UtilityType::Electric);
        assert_eq!(UtilityKind::Spire.utility_type(), UtilityType::Gas);
        assert_eq!(UtilityKind::MontgomeryWaterWorks.utility_type(), UtilityType::Water);
        assert_eq!(UtilityType::Electric.as_str(), "electric");
    }
}
