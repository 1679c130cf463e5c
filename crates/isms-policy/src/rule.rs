//! Rule and table types used inside the policy document.
//!
//! Everything here is plain data deserialized from TOML. Tables keyed by a
//! classification or a risk level are expressed as structs with one field
//! per label, so a policy file reads:
//!
//! ```toml
//! [risk.review_interval_days]
//! low = 365
//! medium = 180
//! high = 90
//! critical = 30
//! ```

use serde::{Deserialize, Serialize};

use isms_contracts::{classification::Classification, event::AlertSeverity, risk::RiskLevel};

/// Maps `(action, resource_type)` pairs to compliance flags.
///
/// Both lists accept the wildcard `"*"`. Unlike access rules, flag rules do
/// not short-circuit: every matching rule contributes its flags.
///
/// Example in TOML:
/// ```toml
/// [[audit.flag_rules]]
/// id = "gdpr-personal-data"
/// description = "Processing of personal data"
/// actions = ["read", "update", "export"]
/// resource_types = ["customer", "employee"]
/// flags = ["GDPR_DATA_PROCESSING"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRule {
    /// Stable identifier used in logs.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Action patterns. `"*"` matches any action.
    pub actions: Vec<String>,

    /// Resource type patterns. `"*"` matches any resource type.
    pub resource_types: Vec<String>,

    /// Flags attached to events that match.
    pub flags: Vec<String>,
}

impl FlagRule {
    /// Return true if this rule applies to `action` on `resource_type`.
    ///
    /// Matching is exact and case-sensitive apart from the `"*"` wildcard.
    pub fn matches(&self, action: &str, resource_type: &str) -> bool {
        let action_matches = self.actions.iter().any(|a| a == "*" || a == action);
        let resource_matches = self
            .resource_types
            .iter()
            .any(|r| r == "*" || r == resource_type);
        action_matches && resource_matches
    }
}

/// One value per classification label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTable<T> {
    pub public: T,
    pub internal: T,
    pub confidential: T,
    pub restricted: T,
}

impl<T> ClassificationTable<T> {
    pub fn get(&self, classification: Classification) -> &T {
        match classification {
            Classification::Public => &self.public,
            Classification::Internal => &self.internal,
            Classification::Confidential => &self.confidential,
            Classification::Restricted => &self.restricted,
        }
    }
}

/// One value per risk level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
    pub critical: T,
}

impl<T> LevelTable<T> {
    pub fn get(&self, level: RiskLevel) -> &T {
        match level {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
            RiskLevel::Critical => &self.critical,
        }
    }
}

/// Roles notified for each alert severity, in escalation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationMatrix {
    pub high: Vec<String>,
    pub critical: Vec<String>,
}

impl EscalationMatrix {
    pub fn for_severity(&self, severity: AlertSeverity) -> &[String] {
        match severity {
            AlertSeverity::High => &self.high,
            AlertSeverity::Critical => &self.critical,
        }
    }
}

/// Additive risk modifiers applied on top of an event's base score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModifiers {
    pub suspicious_network: u8,
    pub unusual_time: u8,
    pub unusual_location: u8,
    pub repeated_failures: u8,
    pub elevated_privilege: u8,
}

impl Default for RiskModifiers {
    fn default() -> Self {
        Self {
            suspicious_network: 2,
            unusual_time: 1,
            unusual_location: 2,
            repeated_failures: 2,
            elevated_privilege: 1,
        }
    }
}

/// Lower bounds of the upper three risk levels; anything below `medium`
/// is LOW.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 6,
            high: 10,
            critical: 15,
        }
    }
}

/// Which catalog entries apply to one asset type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relevance {
    pub threats: Vec<String>,
    pub vulnerabilities: Vec<String>,
}
