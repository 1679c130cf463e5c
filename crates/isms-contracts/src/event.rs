//! Security events, audit entries, and chain verification reports.
//!
//! A `SecurityEvent` is what callers hand to the audit trail. The trail turns
//! it into an `AuditEntry`: tagged, scored, and hash-linked to the previous
//! entry of the same tenant. Entries serialize to the ledger wire format
//! unchanged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `previous_hash` of the first entry in every tenant chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Behavioural signals the caller observed alongside an event.
///
/// Network origin and time-of-day are judged by the trail itself; these are
/// the signals only the caller can know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSignals {
    /// The actor is somewhere they do not normally operate from.
    #[serde(default)]
    pub unusual_location: bool,
    /// Consecutive failed attempts preceding this event.
    #[serde(default)]
    pub failed_attempts: u32,
    /// The actor used an elevated privilege to perform the action.
    #[serde(default)]
    pub privileged: bool,
}

/// A security-relevant event reported by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Category, e.g. `"login_failure"`, `"data_export"`, `"security_breach"`.
    pub event_type: String,
    /// The actor who triggered the event.
    pub user_id: String,
    /// Tenant whose chain records the event.
    pub tenant_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// When the event happened. Defaults to the time it is logged.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signals: EventSignals,
}

impl SecurityEvent {
    /// Build an event with the required fields and no optional context.
    pub fn new(
        event_type: impl Into<String>,
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            details: BTreeMap::new(),
            ip_address: None,
            user_agent: None,
            session_id: None,
            occurred_at: None,
            signals: EventSignals::default(),
        }
    }

    /// Add one entry to the details map.
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    pub fn with_signals(mut self, signals: EventSignals) -> Self {
        self.signals = signals;
        self
    }
}

/// One immutable record in a tenant's hash chain.
///
/// `integrity_hash` commits to every other field, including
/// `previous_hash`, so altering any stored value is detected by chain
/// verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub user_id: String,
    pub tenant_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    pub details: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub compliance_flags: BTreeSet<String>,
    /// 0 (benign) to 10 (critical).
    pub risk_score: u8,
    /// SHA-256 hex of this entry's canonical content.
    pub integrity_hash: String,
    /// `integrity_hash` of the preceding entry, or `GENESIS_HASH`.
    pub previous_hash: String,
}

/// Filters for reading entries back out of the ledger.
///
/// Every populated field must match; `None` fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub compliance_flag: Option<String>,
    pub min_risk_score: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    /// Return true if `entry` satisfies every populated filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        entry.tenant_id == self.tenant_id
            && eq(&self.user_id, &entry.user_id)
            && eq(&self.event_type, &entry.event_type)
            && eq(&self.resource_type, &entry.resource_type)
            && eq(&self.resource_id, &entry.resource_id)
            && self
                .compliance_flag
                .as_ref()
                .map_or(true, |f| entry.compliance_flags.contains(f))
            && self.min_risk_score.map_or(true, |m| entry.risk_score >= m)
            && self.since.map_or(true, |s| entry.timestamp >= s)
            && self.until.map_or(true, |u| entry.timestamp <= u)
    }
}

/// How an entry failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    /// The recomputed hash differs from the stored `integrity_hash`.
    HashMismatch,
    /// `previous_hash` does not point at the preceding entry.
    BrokenLink,
}

/// A single integrity failure found by chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreach {
    pub entry_id: Uuid,
    /// Zero-based position of the entry in its tenant chain.
    pub position: usize,
    pub kind: BreachKind,
    /// For `HashMismatch` the recomputed hash; for `BrokenLink` the
    /// predecessor's stored hash.
    pub expected_hash: String,
    /// For `HashMismatch` the stored `integrity_hash`; for `BrokenLink` the
    /// stored `previous_hash`.
    pub stored_hash: String,
}

/// The outcome of verifying part or all of a tenant chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub tenant_id: String,
    /// First position requested.
    pub range_start: usize,
    /// One past the last position requested (clamped to the chain length).
    pub range_end: usize,
    pub entries_checked: usize,
    pub breaches: Vec<ChainBreach>,
    /// False when the scan was cancelled before reaching `range_end`.
    pub complete: bool,
    pub verified_at: DateTime<Utc>,
}

impl IntegrityReport {
    /// True when no breach was found in the entries checked so far.
    pub fn is_intact(&self) -> bool {
        self.breaches.is_empty()
    }
}

/// Alert severity tier; selects the escalation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::High => f.write_str("high"),
            AlertSeverity::Critical => f.write_str("critical"),
        }
    }
}

/// A critical-event notification handed to the alerting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub severity: AlertSeverity,
    pub tenant_id: String,
    pub entry_id: Uuid,
    pub event_type: String,
    pub risk_score: u8,
    pub description: String,
    pub details: serde_json::Value,
    /// Roles to notify, in escalation order.
    pub escalation: Vec<String>,
}
