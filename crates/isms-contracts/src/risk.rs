//! Asset, catalog, and risk assessment types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classification::Classification;

/// Asset metadata as returned by the asset registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    pub tenant_id: String,
    pub name: String,
    /// Matched against the threat/vulnerability relevance table,
    /// e.g. `"database"`, `"web_application"`, `"audit_log"`.
    pub asset_type: String,
    pub classification: Classification,
    /// Business value, 1 (negligible) to 10 (crown jewel).
    pub business_value: u8,
}

/// A threat from the static catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threat {
    pub id: String,
    pub name: String,
    /// Base likelihood, 1 to 5.
    pub likelihood: u8,
}

/// A vulnerability from the static catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub name: String,
    /// Severity, 1 to 5.
    pub severity: u8,
}

/// Coarse risk bucket. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// One item of the time-bound treatment checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitigation {
    pub action: String,
    /// Hours from assessment within which the action is due.
    #[serde(default)]
    pub deadline_hours: Option<u32>,
    /// Role whose sign-off closes the item, if any.
    #[serde(default)]
    pub sign_off: Option<String>,
}

/// Which regulatory frameworks apply to the assessed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    pub data_protection: bool,
    pub financial_controls: bool,
    pub security_management: bool,
    /// Names of the applicable frameworks, e.g. `["GDPR", "ISO27001"]`.
    pub frameworks: Vec<String>,
}

/// A point-in-time risk profile for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub asset_id: String,
    pub tenant_id: String,
    /// 1 to 5.
    pub impact_score: u8,
    /// 1 to 5.
    pub likelihood_score: u8,
    /// `impact_score × likelihood_score`, 1 to 25.
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub threats: Vec<Threat>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub mitigation_required: bool,
    pub required_mitigations: Vec<Mitigation>,
    pub assessed_at: DateTime<Utc>,
    pub next_assessment_due: DateTime<Utc>,
    pub compliance: ComplianceSnapshot,
}

/// Aggregate view of a tenant's latest assessments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDashboard {
    pub tenant_id: String,
    /// Assets with at least one assessment.
    pub assessed_assets: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub mitigation_required: usize,
    /// Assets whose `next_assessment_due` has passed.
    pub overdue_reviews: usize,
}
