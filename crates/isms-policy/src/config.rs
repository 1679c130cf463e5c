//! The policy document and its built-in defaults.
//!
//! A `PolicyConfig` is deserialized from TOML. Every section and field has a
//! default, so a policy file only needs to state what it overrides; an empty
//! document yields the built-in tables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    risk::{Mitigation, Threat, Vulnerability},
};

use crate::rule::{
    ClassificationTable, EscalationMatrix, FlagRule, LevelTable, Relevance, RiskModifiers,
    RiskThresholds,
};

/// The top-level structure deserialized from a TOML policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub audit: AuditPolicy,
    pub access: AccessPolicy,
    pub keys: KeyPolicy,
    pub risk: RiskPolicy,
}

impl PolicyConfig {
    /// Parse `s` as TOML, fill in defaults, and validate the result.
    ///
    /// Returns `IsmsError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or describes an inconsistent policy.
    pub fn from_toml_str(s: &str) -> IsmsResult<Self> {
        let config: PolicyConfig = toml::from_str(s).map_err(|e| IsmsError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as a policy document.
    pub fn from_file(path: &Path) -> IsmsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| IsmsError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check cross-field invariants the type system cannot express.
    pub fn validate(&self) -> IsmsResult<()> {
        let fail = |reason: String| Err(IsmsError::ConfigError { reason });

        let audit = &self.audit;
        if audit.business_hours_start >= 24 || audit.business_hours_end > 24 {
            return fail("business hours must lie within 0..=24".to_string());
        }
        if audit.business_hours_start >= audit.business_hours_end {
            return fail("business_hours_start must precede business_hours_end".to_string());
        }

        if self.keys.kdf_iterations < MIN_KDF_ITERATIONS {
            return fail(format!(
                "kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                self.keys.kdf_iterations
            ));
        }
        if self.keys.rotation_period_days == 0 {
            return fail("rotation_period_days must be positive".to_string());
        }

        let risk = &self.risk;
        let t = &risk.thresholds;
        if !(1 <= t.medium && t.medium < t.high && t.high < t.critical && t.critical <= 25) {
            return fail(format!(
                "risk thresholds must satisfy 1 <= medium < high < critical <= 25, got {}/{}/{}",
                t.medium, t.high, t.critical
            ));
        }

        let m = &risk.classification_multipliers;
        if !(1.0 <= m.public
            && m.public <= m.internal
            && m.internal <= m.confidential
            && m.confidential <= m.restricted)
        {
            return fail(
                "classification multipliers must be >= 1.0 and non-decreasing with sensitivity"
                    .to_string(),
            );
        }

        for threat in &risk.threats {
            if !(1..=5).contains(&threat.likelihood) {
                return fail(format!(
                    "threat '{}' likelihood {} outside 1..=5",
                    threat.id, threat.likelihood
                ));
            }
        }
        for vuln in &risk.vulnerabilities {
            if !(1..=5).contains(&vuln.severity) {
                return fail(format!(
                    "vulnerability '{}' severity {} outside 1..=5",
                    vuln.id, vuln.severity
                ));
            }
        }
        for (asset_type, relevance) in &risk.relevance {
            for id in &relevance.threats {
                if !risk.threats.iter().any(|t| &t.id == id) {
                    return fail(format!(
                        "relevance for '{asset_type}' names unknown threat '{id}'"
                    ));
                }
            }
            for id in &relevance.vulnerabilities {
                if !risk.vulnerabilities.iter().any(|v| &v.id == id) {
                    return fail(format!(
                        "relevance for '{asset_type}' names unknown vulnerability '{id}'"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Lowest PBKDF2 iteration count a policy may configure.
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

// ── Audit ─────────────────────────────────────────────────────────────────────

/// Tagging, scoring, and alerting tables for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditPolicy {
    /// Base risk per event type.
    pub base_risk: BTreeMap<String, u8>,
    /// Base risk for event types absent from `base_risk`.
    pub default_base_risk: u8,
    pub modifiers: RiskModifiers,
    /// IP prefixes treated as a suspicious network origin.
    pub suspicious_ip_prefixes: Vec<String>,
    /// Business hours in UTC, `[start, end)`. Events outside are unusual.
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    /// Failed attempts at or above this count add the repeated-failure modifier.
    pub failed_attempts_threshold: u32,
    /// Risk score at which an event is critical.
    pub critical_risk_score: u8,
    /// Risk score at which a critical event escalates at `critical` severity.
    pub critical_severity_score: u8,
    /// Event types that are always critical.
    pub breach_event_types: Vec<String>,
    /// Compliance flags that make an event critical.
    pub violation_flags: Vec<String>,
    pub escalation: EscalationMatrix,
    pub flag_rules: Vec<FlagRule>,
    /// Re-reads of the chain head after a concurrent-append collision.
    pub chain_conflict_retries: u32,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        let base_risk = [
            ("logout", 0),
            ("login_success", 1),
            ("encryption", 1),
            ("data_access", 2),
            ("decryption", 2),
            ("risk_assessment", 2),
            ("login_failure", 3),
            ("key_rotation", 3),
            ("data_modification", 4),
            ("configuration_change", 5),
            ("data_deletion", 5),
            ("data_export", 5),
            ("access_denied", 6),
            ("permission_change", 6),
            ("privileged_action", 6),
            ("unauthorized_access", 8),
            ("security_breach", 10),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            base_risk,
            default_base_risk: 2,
            modifiers: RiskModifiers::default(),
            suspicious_ip_prefixes: strings(&["185.220.", "45.155.", "198.51.100."]),
            business_hours_start: 6,
            business_hours_end: 22,
            failed_attempts_threshold: 3,
            critical_risk_score: 8,
            critical_severity_score: 9,
            breach_event_types: strings(&["security_breach", "data_breach", "unauthorized_access"]),
            violation_flags: strings(&["ISO27001_ACCESS_VIOLATION"]),
            escalation: EscalationMatrix {
                high: strings(&["security_team"]),
                critical: strings(&["security_team", "ciso", "data_protection_officer"]),
            },
            flag_rules: default_flag_rules(),
            chain_conflict_retries: 1,
        }
    }
}

fn default_flag_rules() -> Vec<FlagRule> {
    vec![
        FlagRule {
            id: "gdpr-personal-data".to_string(),
            description: "Processing of personal data".to_string(),
            actions: strings(&["create", "read", "update", "delete", "export"]),
            resource_types: strings(&["customer", "contact", "lead", "employee", "personal_data"]),
            flags: strings(&["GDPR_DATA_PROCESSING"]),
        },
        FlagRule {
            id: "sox-financial-change".to_string(),
            description: "Changes to financial records".to_string(),
            actions: strings(&["create", "update", "delete", "approve"]),
            resource_types: strings(&[
                "invoice",
                "payment",
                "journal_entry",
                "ledger",
                "expense",
                "financial_report",
            ]),
            flags: strings(&["SOX_FINANCIAL_CHANGE_CONTROL"]),
        },
        FlagRule {
            id: "iso27001-access-violation".to_string(),
            description: "Denied or unauthorized access attempts".to_string(),
            actions: strings(&["access_denied", "unauthorized_access", "privilege_escalation"]),
            resource_types: strings(&["*"]),
            flags: strings(&["ISO27001_ACCESS_VIOLATION"]),
        },
        FlagRule {
            id: "pci-payment-data".to_string(),
            description: "Any handling of payment card data".to_string(),
            actions: strings(&["*"]),
            resource_types: strings(&["payment_card", "cardholder_data"]),
            flags: strings(&["PCI_DSS_PAYMENT_DATA"]),
        },
    ]
}

// ── Access ────────────────────────────────────────────────────────────────────

/// The role × classification matrix gating decryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    /// Roles allowed to read each classification. `"*"` admits any role.
    pub matrix: ClassificationTable<Vec<String>>,
    /// Roles allowed to read another tenant's payloads.
    pub cross_tenant_roles: Vec<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            matrix: ClassificationTable {
                public: strings(&["*"]),
                internal: strings(&["*"]),
                confidential: strings(&["admin", "auditor", "system"]),
                restricted: strings(&["admin", "auditor"]),
            },
            cross_tenant_roles: strings(&["admin", "auditor"]),
        }
    }
}

// ── Keys ──────────────────────────────────────────────────────────────────────

/// Key derivation and lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPolicy {
    pub kdf_iterations: u32,
    pub rotation_period_days: u32,
    /// Identifiers that may no longer be used to decrypt.
    pub retired_keys: Vec<String>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            kdf_iterations: 100_000,
            rotation_period_days: 90,
            retired_keys: Vec::new(),
        }
    }
}

// ── Risk ──────────────────────────────────────────────────────────────────────

/// Catalogs and scoring tables for the risk engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub classification_multipliers: ClassificationTable<f64>,
    pub thresholds: RiskThresholds,
    /// Score at which mitigation becomes mandatory, independent of levels.
    pub mitigation_threshold: u8,
    pub review_interval_days: LevelTable<u32>,
    pub mitigations: LevelTable<Vec<Mitigation>>,
    pub threats: Vec<Threat>,
    pub vulnerabilities: Vec<Vulnerability>,
    /// Asset type → applicable catalog entries.
    pub relevance: BTreeMap<String, Relevance>,
    /// Asset types holding personal data (data-protection applicability).
    pub personal_data_asset_types: Vec<String>,
    /// Asset types under financial controls.
    pub financial_asset_types: Vec<String>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            classification_multipliers: ClassificationTable {
                public: 1.0,
                internal: 1.5,
                confidential: 2.0,
                restricted: 2.5,
            },
            thresholds: RiskThresholds::default(),
            mitigation_threshold: 10,
            review_interval_days: LevelTable {
                low: 365,
                medium: 180,
                high: 90,
                critical: 30,
            },
            mitigations: default_mitigations(),
            threats: default_threats(),
            vulnerabilities: default_vulnerabilities(),
            relevance: default_relevance(),
            personal_data_asset_types: strings(&["crm", "customer_database", "hr_system"]),
            financial_asset_types: strings(&[
                "financial_system",
                "payment_gateway",
                "accounting",
                "erp",
            ]),
        }
    }
}

fn mitigation(action: &str, deadline_hours: Option<u32>, sign_off: Option<&str>) -> Mitigation {
    Mitigation {
        action: action.to_string(),
        deadline_hours,
        sign_off: sign_off.map(str::to_string),
    }
}

fn default_mitigations() -> LevelTable<Vec<Mitigation>> {
    LevelTable {
        critical: vec![
            mitigation("Contain or isolate the affected asset", Some(24), None),
            mitigation("Apply emergency compensating controls", Some(24), None),
            mitigation(
                "Escalate to executive management and obtain board-level sign-off on the treatment plan",
                Some(24),
                Some("board"),
            ),
            mitigation("Reassess after treatment", Some(720), None),
        ],
        high: vec![
            mitigation("Produce a documented risk treatment plan", Some(168), None),
            mitigation("Implement additional controls", Some(720), None),
            mitigation("Risk owner approval of residual risk", Some(720), Some("risk_owner")),
        ],
        medium: vec![
            mitigation("Review effectiveness of existing controls", Some(2160), None),
            mitigation("Monitor for changes in the threat landscape", None, None),
        ],
        low: vec![mitigation(
            "Document risk acceptance",
            None,
            Some("risk_owner"),
        )],
    }
}

fn threat(id: &str, name: &str, likelihood: u8) -> Threat {
    Threat {
        id: id.to_string(),
        name: name.to_string(),
        likelihood,
    }
}

fn default_threats() -> Vec<Threat> {
    vec![
        threat("malware", "Malware infection", 3),
        threat("phishing", "Phishing and social engineering", 4),
        threat("ransomware", "Ransomware", 3),
        threat("insider_threat", "Malicious or negligent insider", 2),
        threat("data_breach", "External data breach", 3),
        threat("sql_injection", "Injection attack", 3),
        threat("ddos", "Denial of service", 2),
        threat("credential_stuffing", "Credential stuffing", 3),
        threat("log_tampering", "Tampering with audit records", 2),
        threat("physical_theft", "Theft of equipment", 2),
        threat("misconfiguration_exploit", "Exploitation of misconfiguration", 3),
    ]
}

fn vulnerability(id: &str, name: &str, severity: u8) -> Vulnerability {
    Vulnerability {
        id: id.to_string(),
        name: name.to_string(),
        severity,
    }
}

fn default_vulnerabilities() -> Vec<Vulnerability> {
    vec![
        vulnerability("unpatched_software", "Unpatched software", 4),
        vulnerability("weak_authentication", "Weak authentication", 4),
        vulnerability("misconfiguration", "Security misconfiguration", 3),
        vulnerability("unencrypted_data", "Unencrypted data at rest", 4),
        vulnerability("excessive_privileges", "Excessive privileges", 3),
        vulnerability("insufficient_logging", "Insufficient logging and monitoring", 2),
        vulnerability("missing_backups", "Missing or untested backups", 3),
        vulnerability("exposed_interfaces", "Exposed management interfaces", 3),
    ]
}

fn default_relevance() -> BTreeMap<String, Relevance> {
    let entries: [(&str, &[&str], &[&str]); 9] = [
        (
            "database",
            &["data_breach", "sql_injection", "insider_threat", "ransomware"],
            &["unencrypted_data", "excessive_privileges", "weak_authentication", "unpatched_software"],
        ),
        (
            "web_application",
            &["sql_injection", "credential_stuffing", "ddos", "data_breach"],
            &["unpatched_software", "weak_authentication", "misconfiguration", "exposed_interfaces"],
        ),
        (
            "server",
            &["malware", "ransomware", "misconfiguration_exploit"],
            &["unpatched_software", "misconfiguration", "missing_backups"],
        ),
        (
            "endpoint",
            &["malware", "phishing", "physical_theft"],
            &["unpatched_software", "unencrypted_data"],
        ),
        (
            "network",
            &["ddos", "misconfiguration_exploit"],
            &["misconfiguration", "exposed_interfaces"],
        ),
        (
            "audit_log",
            &["log_tampering", "insider_threat"],
            &["insufficient_logging", "excessive_privileges"],
        ),
        (
            "financial_system",
            &["insider_threat", "data_breach", "credential_stuffing"],
            &["excessive_privileges", "weak_authentication", "insufficient_logging"],
        ),
        (
            "crm",
            &["data_breach", "phishing", "insider_threat"],
            &["excessive_privileges", "weak_authentication", "unencrypted_data"],
        ),
        (
            "document_store",
            &["data_breach", "ransomware"],
            &["unencrypted_data", "missing_backups"],
        ),
    ];

    entries
        .into_iter()
        .map(|(asset_type, threats, vulns)| {
            (
                asset_type.to_string(),
                Relevance {
                    threats: strings(threats),
                    vulnerabilities: strings(vulns),
                },
            )
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
