//! Turning a `SecurityEvent` into the tagged, scored parts of an entry.
//!
//! Everything here is a pure function of the event and the `AuditPolicy`;
//! chain state is handled by the trail.

use std::collections::BTreeSet;

use chrono::{DateTime, Timelike, Utc};
use serde_json::json;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::{AuditEntry, SecurityAlert, SecurityEvent},
};
use isms_policy::AuditPolicy;

/// Highest risk score an event can carry.
pub const MAX_RISK_SCORE: u8 = 10;

/// Reject events missing a required field.
///
/// Runs before any hashing so a malformed event never touches the chain.
pub fn validate_event(event: &SecurityEvent) -> IsmsResult<()> {
    let required = [
        ("event_type", &event.event_type),
        ("user_id", &event.user_id),
        ("tenant_id", &event.tenant_id),
        ("resource_type", &event.resource_type),
        ("resource_id", &event.resource_id),
        ("action", &event.action),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(IsmsError::Validation {
                reason: format!("security event field '{name}' must not be empty"),
            });
        }
    }
    if event.details.keys().any(|k| k.is_empty()) {
        return Err(IsmsError::Validation {
            reason: "security event details must not contain empty keys".to_string(),
        });
    }
    Ok(())
}

/// Compute the 0–10 risk score of `event` as of `at`.
///
/// Base score from the event-type table, plus each modifier that applies,
/// capped at `MAX_RISK_SCORE`.
pub fn score_event(policy: &AuditPolicy, event: &SecurityEvent, at: DateTime<Utc>) -> u8 {
    let modifiers = &policy.modifiers;
    let mut score = u32::from(policy.base_risk(&event.event_type));

    if event
        .ip_address
        .as_deref()
        .is_some_and(|ip| policy.is_suspicious_ip(ip))
    {
        score += u32::from(modifiers.suspicious_network);
    }
    if policy.is_unusual_hour(at.hour()) {
        score += u32::from(modifiers.unusual_time);
    }
    if event.signals.unusual_location {
        score += u32::from(modifiers.unusual_location);
    }
    if event.signals.failed_attempts >= policy.failed_attempts_threshold {
        score += u32::from(modifiers.repeated_failures);
    }
    if event.signals.privileged {
        score += u32::from(modifiers.elevated_privilege);
    }

    score.min(u32::from(MAX_RISK_SCORE)) as u8
}

/// An event is critical on a high score, a violation flag, or a breach
/// event type.
pub fn is_critical(
    policy: &AuditPolicy,
    event_type: &str,
    flags: &BTreeSet<String>,
    risk_score: u8,
) -> bool {
    risk_score >= policy.critical_risk_score
        || policy.has_violation_flag(flags)
        || policy.is_breach_event(event_type)
}

/// Build the alert for a critical entry.
pub fn build_alert(policy: &AuditPolicy, entry: &AuditEntry) -> SecurityAlert {
    let severity = policy.alert_severity(&entry.event_type, entry.risk_score);
    SecurityAlert {
        severity,
        tenant_id: entry.tenant_id.clone(),
        entry_id: entry.id,
        event_type: entry.event_type.clone(),
        risk_score: entry.risk_score,
        description: format!(
            "{} by '{}' on {}/{} (risk {})",
            entry.event_type, entry.user_id, entry.resource_type, entry.resource_id, entry.risk_score
        ),
        details: json!({
            "action": entry.action,
            "compliance_flags": entry.compliance_flags,
            "ip_address": entry.ip_address,
            "session_id": entry.session_id,
            "timestamp": entry.timestamp,
            "details": entry.details,
        }),
        escalation: policy.escalation.for_severity(severity).to_vec(),
    }
}
