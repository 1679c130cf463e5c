//! Simulated tenant data for the demo.
//!
//! All data in this module is hardcoded and fictional. It stands in for the
//! identity provider, asset inventory and secrets manager of a production
//! deployment.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use isms_contracts::{
    classification::Classification,
    event::{EventSignals, SecurityEvent},
    risk::Asset,
};

pub const TENANT: &str = "acme-health";

/// Master secret, version 1. Never ship a secret in source.
pub const MASTER_SECRET_V1: &[u8] = b"mock-master-secret-v1-not-for-prod";

/// Version 2 of the master secret, used to show a master rollover.
pub const MASTER_SECRET_V2: &[u8] = b"mock-master-secret-v2-not-for-prod";

// ── Security events ──────────────────────────────────────────────────────────

/// A working day at the tenant, from routine to alarming.
pub fn workday_events() -> Vec<SecurityEvent> {
    vec![
        SecurityEvent::new("login_success", "alice", TENANT, "session", "s-100", "login")
            .at(at(8, 55))
            .with_ip("10.0.4.17")
            .with_session("s-100"),
        SecurityEvent::new("data_access", "alice", TENANT, "customer", "cust-4411", "read")
            .at(at(9, 12))
            .with_ip("10.0.4.17")
            .with_session("s-100"),
        SecurityEvent::new("data_export", "bob", TENANT, "cardholder_data", "batch-77", "export")
            .at(at(11, 40))
            .with_ip("10.0.9.3")
            .with_detail("rows", json!(1250)),
        SecurityEvent::new("login_failure", "mallory", TENANT, "session", "s-666", "login")
            .at(at(2, 14))
            .with_ip("185.220.101.4")
            .with_signals(EventSignals {
                failed_attempts: 5,
                ..EventSignals::default()
            }),
        SecurityEvent::new(
            "privileged_action",
            "carol",
            TENANT,
            "configuration",
            "firewall",
            "modify",
        )
        .at(at(14, 5))
        .with_signals(EventSignals {
            unusual_location: true,
            privileged: true,
            ..EventSignals::default()
        }),
        SecurityEvent::new("security_breach", "ids", TENANT, "database", "db-core", "exfiltrate")
            .at(at(15, 30))
            .with_detail("signature", json!("ET EXFIL large outbound transfer")),
    ]
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

// ── Asset inventory ──────────────────────────────────────────────────────────

pub fn assets() -> Vec<Asset> {
    vec![
        asset("db-core", "Core patient database", "database", Classification::Restricted, 9),
        asset("crm-01", "Customer relationship manager", "crm", Classification::Confidential, 7),
        asset("pay-gw", "Payment gateway", "payment_gateway", Classification::Restricted, 8),
        asset("web-portal", "Patient web portal", "web_application", Classification::Internal, 6),
        asset("kiosk-3", "Lobby check-in kiosk", "endpoint", Classification::Public, 2),
    ]
}

fn asset(
    id: &str,
    name: &str,
    asset_type: &str,
    classification: Classification,
    business_value: u8,
) -> Asset {
    Asset {
        asset_id: id.to_string(),
        tenant_id: TENANT.to_string(),
        name: name.to_string(),
        asset_type: asset_type.to_string(),
        classification,
        business_value,
    }
}
