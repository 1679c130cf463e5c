//! # isms-policy
//!
//! TOML-driven policy tables for the ISMS compliance engine.
//!
//! ## Overview
//!
//! Every policy decision the engine makes is a table lookup against a
//! [`PolicyConfig`]: which compliance flags an event carries, how risky an
//! event type is, who gets paged for a critical event, which roles may read
//! which classification, how long keys live, and how assets are scored.
//! Tables are loaded from TOML so policy can change without recompiling.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use isms_policy::PolicyConfig;
//!
//! let policy = PolicyConfig::from_file(Path::new("policies/isms.toml"))?;
//! let flags = policy.audit.compliance_flags("export", "customer");
//! ```
//!
//! ## Rule matching
//!
//! Flag rules list `actions` and `resource_types`; both support the wildcard
//! `"*"`. All matching rules contribute. Access is deny-by-default: a role
//! missing from a classification's list is refused.

pub mod config;
pub mod engine;
pub mod rule;

pub use config::{AccessPolicy, AuditPolicy, KeyPolicy, PolicyConfig, RiskPolicy};
pub use engine::AccessVerdict;
pub use rule::{ClassificationTable, EscalationMatrix, FlagRule, LevelTable, Relevance};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use isms_contracts::{
        classification::Classification,
        error::IsmsError,
        event::AlertSeverity,
        risk::RiskLevel,
    };

    use crate::{AccessVerdict, PolicyConfig};

    const REFERENCE_POLICY: &str = include_str!("../../../policies/isms.toml");

    // ── 1. loading ────────────────────────────────────────────────────────────

    /// An empty document yields the built-in tables.
    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PolicyConfig::from_toml_str("").unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    /// The shipped reference policy spells out exactly the built-in tables.
    #[test]
    fn test_reference_policy_matches_defaults() {
        let config = PolicyConfig::from_toml_str(REFERENCE_POLICY).unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    /// A partial document overrides only what it names.
    #[test]
    fn test_partial_override() {
        let toml = r#"
            [keys]
            rotation_period_days = 30

            [risk]
            mitigation_threshold = 15
        "#;

        let config = PolicyConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.keys.rotation_period_days, 30);
        assert_eq!(config.keys.kdf_iterations, 100_000);
        assert_eq!(config.risk.mitigation_threshold, 15);
        assert_eq!(config.risk.thresholds.critical, 15);
        assert!(!config.audit.flag_rules.is_empty());
    }

    /// Malformed TOML must produce a `ConfigError`.
    #[test]
    fn test_toml_parse_error() {
        let result = PolicyConfig::from_toml_str("this is not valid toml ][[[");
        match result {
            Err(IsmsError::ConfigError { reason }) => {
                assert!(
                    reason.contains("failed to parse policy TOML"),
                    "expected parse error message, got: {reason}"
                );
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    // ── 2. validation ─────────────────────────────────────────────────────────

    #[test]
    fn test_rejects_unordered_thresholds() {
        let toml = r#"
            [risk.thresholds]
            medium = 10
            high = 6
            critical = 15
        "#;
        assert!(matches!(
            PolicyConfig::from_toml_str(toml),
            Err(IsmsError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_rejects_weak_kdf() {
        let toml = r#"
            [keys]
            kdf_iterations = 10
        "#;
        match PolicyConfig::from_toml_str(toml) {
            Err(IsmsError::ConfigError { reason }) => assert!(reason.contains("kdf_iterations")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_decreasing_multipliers() {
        let toml = r#"
            [risk.classification_multipliers]
            public = 2.0
            internal = 1.5
            confidential = 2.0
            restricted = 2.5
        "#;
        assert!(PolicyConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_relevance_to_unknown_threat() {
        let toml = r#"
            [risk.relevance.kiosk]
            threats = ["alien_invasion"]
        "#;
        match PolicyConfig::from_toml_str(toml) {
            Err(IsmsError::ConfigError { reason }) => assert!(reason.contains("alien_invasion")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    // ── 3. compliance flags ───────────────────────────────────────────────────

    #[test]
    fn test_flags_union_across_matching_rules() {
        let toml = r#"
            [[audit.flag_rules]]
            id = "a"
            actions = ["export"]
            resource_types = ["customer"]
            flags = ["GDPR_DATA_PROCESSING"]

            [[audit.flag_rules]]
            id = "b"
            actions = ["*"]
            resource_types = ["customer"]
            flags = ["CUSTOMER_TOUCH"]

            [[audit.flag_rules]]
            id = "c"
            actions = ["delete"]
            resource_types = ["*"]
            flags = ["NEVER"]
        "#;

        let config = PolicyConfig::from_toml_str(toml).unwrap();
        let flags = config.audit.compliance_flags("export", "customer");

        let names: Vec<&str> = flags.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["CUSTOMER_TOUCH", "GDPR_DATA_PROCESSING"]);
    }

    #[test]
    fn test_default_flag_table() {
        let audit = PolicyConfig::default().audit;

        assert!(audit
            .compliance_flags("update", "invoice")
            .contains("SOX_FINANCIAL_CHANGE_CONTROL"));
        assert!(audit
            .compliance_flags("read", "cardholder_data")
            .contains("PCI_DSS_PAYMENT_DATA"));
        assert!(audit
            .compliance_flags("access_denied", "encrypted_payload")
            .contains("ISO27001_ACCESS_VIOLATION"));
        assert!(audit.compliance_flags("read", "inventory_item").is_empty());
    }

    // ── 4. event scoring tables ───────────────────────────────────────────────

    #[test]
    fn test_base_risk_falls_back_to_default() {
        let audit = PolicyConfig::default().audit;
        assert_eq!(audit.base_risk("security_breach"), 10);
        assert_eq!(audit.base_risk("login_failure"), 3);
        assert_eq!(audit.base_risk("something_new"), audit.default_base_risk);
    }

    #[test]
    fn test_business_hours() {
        let audit = PolicyConfig::default().audit;
        assert!(audit.is_unusual_hour(3));
        assert!(!audit.is_unusual_hour(6));
        assert!(!audit.is_unusual_hour(21));
        assert!(audit.is_unusual_hour(22));
    }

    #[test]
    fn test_alert_severity_tiers() {
        let audit = PolicyConfig::default().audit;
        assert_eq!(audit.alert_severity("privileged_action", 8), AlertSeverity::High);
        assert_eq!(audit.alert_severity("privileged_action", 9), AlertSeverity::Critical);
        assert_eq!(audit.alert_severity("security_breach", 2), AlertSeverity::Critical);
        assert_eq!(
            audit.escalation.for_severity(AlertSeverity::Critical)[1],
            "ciso"
        );
    }

    // ── 5. access matrix ──────────────────────────────────────────────────────

    #[test]
    fn test_access_matrix_defaults() {
        let access = PolicyConfig::default().access;

        assert_eq!(
            access.authorize("viewer", Classification::Internal, true),
            AccessVerdict::Allow
        );
        assert_eq!(
            access.authorize("system", Classification::Confidential, true),
            AccessVerdict::Allow
        );
        assert!(matches!(
            access.authorize("system", Classification::Restricted, true),
            AccessVerdict::Deny { .. }
        ));
        assert_eq!(
            access.authorize("auditor", Classification::Restricted, true),
            AccessVerdict::Allow
        );
    }

    /// Only admin and auditor may cross tenants, even for public data.
    #[test]
    fn test_cross_tenant_denied_for_ordinary_roles() {
        let access = PolicyConfig::default().access;

        match access.authorize("user", Classification::Public, false) {
            AccessVerdict::Deny { reason } => assert!(reason.contains("another tenant")),
            other => panic!("expected Deny, got {:?}", other),
        }
        assert_eq!(
            access.authorize("admin", Classification::Restricted, false),
            AccessVerdict::Allow
        );
    }

    // ── 6. risk tables ────────────────────────────────────────────────────────

    #[test]
    fn test_level_boundaries() {
        let risk = PolicyConfig::default().risk;
        assert_eq!(risk.level_for(1), RiskLevel::Low);
        assert_eq!(risk.level_for(5), RiskLevel::Low);
        assert_eq!(risk.level_for(6), RiskLevel::Medium);
        assert_eq!(risk.level_for(10), RiskLevel::High);
        assert_eq!(risk.level_for(14), RiskLevel::High);
        assert_eq!(risk.level_for(15), RiskLevel::Critical);
        assert_eq!(risk.level_for(25), RiskLevel::Critical);
    }

    #[test]
    fn test_catalog_selection_by_asset_type() {
        let risk = PolicyConfig::default().risk;

        let threats = risk.threats_for("audit_log");
        let ids: Vec<&str> = threats.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["log_tampering", "insider_threat"]);

        assert!(risk.threats_for("coffee_machine").is_empty());
        assert!(risk.vulnerabilities_for("coffee_machine").is_empty());
    }

    #[test]
    fn test_review_intervals() {
        let risk = PolicyConfig::default().risk;
        assert_eq!(risk.review_interval(RiskLevel::Critical).num_days(), 30);
        assert_eq!(risk.review_interval(RiskLevel::Low).num_days(), 365);
    }

    #[test]
    fn test_mitigation_checklist_is_ordered() {
        let risk = PolicyConfig::default().risk;
        let critical = risk.mitigations_for(RiskLevel::Critical);
        assert_eq!(critical[0].deadline_hours, Some(24));
        assert!(critical
            .iter()
            .any(|m| m.sign_off.as_deref() == Some("board")));

        let low = risk.mitigations_for(RiskLevel::Low);
        assert_eq!(low.len(), 1);
        assert!(low[0].action.contains("acceptance"));
    }
}
