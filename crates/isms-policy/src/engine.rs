//! Policy lookups.
//!
//! The policy document is data; this module is the logic that reads it:
//!
//! - `AuditPolicy`  → compliance flags, base risk, escalation lists
//! - `AccessPolicy` → allow / deny for a decryption request
//! - `KeyPolicy`    → retired identifiers, rotation period
//! - `RiskPolicy`   → catalog selection, level bucketing, review intervals
//!
//! Access evaluation is deny-by-default: a role not listed for a
//! classification is refused.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use isms_contracts::{
    classification::Classification,
    event::AlertSeverity,
    risk::{Mitigation, RiskLevel, Threat, Vulnerability},
};

use crate::config::{AccessPolicy, AuditPolicy, KeyPolicy, RiskPolicy};

/// The outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessVerdict {
    Allow,
    Deny {
        /// Human-readable explanation, written to the audit log.
        reason: String,
    },
}

impl AuditPolicy {
    /// Union of the flags of every rule matching `action` on `resource_type`.
    pub fn compliance_flags(&self, action: &str, resource_type: &str) -> BTreeSet<String> {
        let mut flags = BTreeSet::new();
        for rule in &self.flag_rules {
            if rule.matches(action, resource_type) {
                debug!(rule_id = %rule.id, action, resource_type, "flag rule matched");
                flags.extend(rule.flags.iter().cloned());
            }
        }
        flags
    }

    /// Base risk for `event_type`, falling back to `default_base_risk`.
    pub fn base_risk(&self, event_type: &str) -> u8 {
        self.base_risk
            .get(event_type)
            .copied()
            .unwrap_or(self.default_base_risk)
    }

    pub fn is_suspicious_ip(&self, ip: &str) -> bool {
        self.suspicious_ip_prefixes
            .iter()
            .any(|prefix| ip.starts_with(prefix.as_str()))
    }

    /// True when `hour` (UTC, 0–23) falls outside business hours.
    pub fn is_unusual_hour(&self, hour: u32) -> bool {
        hour < self.business_hours_start || hour >= self.business_hours_end
    }

    pub fn is_breach_event(&self, event_type: &str) -> bool {
        self.breach_event_types.iter().any(|t| t == event_type)
    }

    pub fn has_violation_flag(&self, flags: &BTreeSet<String>) -> bool {
        self.violation_flags.iter().any(|f| flags.contains(f))
    }

    /// Severity tier for an event already known to be critical.
    pub fn alert_severity(&self, event_type: &str, risk_score: u8) -> AlertSeverity {
        if risk_score >= self.critical_severity_score || self.is_breach_event(event_type) {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        }
    }
}

impl AccessPolicy {
    /// Decide whether `role` may read a `classification` payload.
    ///
    /// `same_tenant` is false when the caller's tenant differs from the
    /// payload's; only `cross_tenant_roles` may cross that boundary.
    pub fn authorize(
        &self,
        role: &str,
        classification: Classification,
        same_tenant: bool,
    ) -> AccessVerdict {
        if !same_tenant && !self.cross_tenant_roles.iter().any(|r| r == role) {
            warn!(role, "cross-tenant access attempted by unprivileged role");
            return AccessVerdict::Deny {
                reason: format!("role '{role}' may not access another tenant's data"),
            };
        }

        let permitted = self.matrix.get(classification);
        if permitted.iter().any(|r| r == "*" || r == role) {
            AccessVerdict::Allow
        } else {
            warn!(role, classification = %classification, "role not permitted for classification");
            AccessVerdict::Deny {
                reason: format!("role '{role}' is not permitted to read {classification} data"),
            }
        }
    }
}

impl KeyPolicy {
    pub fn is_retired(&self, key_id: &str) -> bool {
        self.retired_keys.iter().any(|k| k == key_id)
    }

    pub fn rotation_period(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.rotation_period_days))
    }
}

impl RiskPolicy {
    /// Catalog threats relevant to `asset_type`, in relevance-table order.
    /// Unknown asset types get none.
    pub fn threats_for(&self, asset_type: &str) -> Vec<Threat> {
        let Some(relevance) = self.relevance.get(asset_type) else {
            return Vec::new();
        };
        relevance
            .threats
            .iter()
            .filter_map(|id| self.threats.iter().find(|t| &t.id == id).cloned())
            .collect()
    }

    /// Catalog vulnerabilities relevant to `asset_type`.
    pub fn vulnerabilities_for(&self, asset_type: &str) -> Vec<Vulnerability> {
        let Some(relevance) = self.relevance.get(asset_type) else {
            return Vec::new();
        };
        relevance
            .vulnerabilities
            .iter()
            .filter_map(|id| self.vulnerabilities.iter().find(|v| &v.id == id).cloned())
            .collect()
    }

    pub fn multiplier(&self, classification: Classification) -> f64 {
        *self.classification_multipliers.get(classification)
    }

    /// Bucket a 1–25 score into a risk level.
    pub fn level_for(&self, risk_score: u8) -> RiskLevel {
        let t = &self.thresholds;
        if risk_score >= t.critical {
            RiskLevel::Critical
        } else if risk_score >= t.high {
            RiskLevel::High
        } else if risk_score >= t.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn requires_mitigation(&self, risk_score: u8) -> bool {
        risk_score >= self.mitigation_threshold
    }

    pub fn review_interval(&self, level: RiskLevel) -> chrono::Duration {
        chrono::Duration::days(i64::from(*self.review_interval_days.get(level)))
    }

    pub fn mitigations_for(&self, level: RiskLevel) -> Vec<Mitigation> {
        self.mitigations.get(level).clone()
    }

    pub fn is_personal_data_asset(&self, asset_type: &str) -> bool {
        self.personal_data_asset_types.iter().any(|t| t == asset_type)
    }

    pub fn is_financial_asset(&self, asset_type: &str) -> bool {
        self.financial_asset_types.iter().any(|t| t == asset_type)
    }
}
