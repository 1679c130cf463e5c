//! Scenario 1: Audit Trail
//!
//! Logs a day of security events for one tenant and shows, per event, the
//! computed risk score, the compliance flags, and where it sits in the hash
//! chain. Two of the events trip the alert rules. The chain is then verified
//! in full and page by page.

use std::sync::Arc;

use isms_audit::{AuditTrail, InMemoryAuditStore, MemoryAlertSink};
use isms_contracts::{error::IsmsResult, event::AuditQuery};
use isms_core::CancellationToken;
use isms_policy::PolicyConfig;

use crate::mock_data::{workday_events, TENANT};

/// The audit ledger shared by every scenario in a `run-all`.
pub struct Ledger {
    pub trail: Arc<AuditTrail>,
    pub store: Arc<InMemoryAuditStore>,
    pub alerts: Arc<MemoryAlertSink>,
}

pub fn ledger(policy: &PolicyConfig) -> Ledger {
    let store = Arc::new(InMemoryAuditStore::new());
    let alerts = Arc::new(MemoryAlertSink::new());
    let trail = AuditTrail::new(store.clone(), policy.audit.clone()).with_alert_sink(alerts.clone());
    Ledger {
        trail: Arc::new(trail),
        store,
        alerts,
    }
}

pub fn run_scenario(policy: &PolicyConfig) -> IsmsResult<()> {
    let ledger = ledger(policy);
    run_with(&ledger)?;
    print_final_verification(&ledger)
}

pub fn run_with(ledger: &Ledger) -> IsmsResult<()> {
    println!("=== Scenario 1: Audit Trail ===");
    println!();

    for event in workday_events() {
        let entry = ledger.trail.log_event_entry(event)?;
        let flags: Vec<&str> = entry.compliance_flags.iter().map(String::as_str).collect();
        println!(
            "  {:<18} {:<8} risk {:>2}  prev {}..  hash {}..  flags [{}]",
            entry.event_type,
            entry.user_id,
            entry.risk_score,
            &entry.previous_hash[..8],
            &entry.integrity_hash[..8],
            flags.join(", ")
        );
    }
    println!();

    let alerts = ledger.alerts.alerts();
    println!("  Alerts raised: {}", alerts.len());
    for alert in &alerts {
        println!(
            "    {:?} {} (risk {}) -> {}",
            alert.severity,
            alert.event_type,
            alert.risk_score,
            alert.escalation.join(", ")
        );
    }
    println!();

    let mut gdpr = AuditQuery::for_tenant(TENANT);
    gdpr.compliance_flag = Some("GDPR".to_string());
    println!("  GDPR-relevant entries: {}", ledger.trail.query(&gdpr)?.len());

    let mut risky = AuditQuery::for_tenant(TENANT);
    risky.min_risk_score = Some(8);
    println!("  Entries with risk >= 8: {}", ledger.trail.query(&risky)?.len());
    println!();

    let paged = ledger
        .trail
        .verify_chain_paged(TENANT, 0..usize::MAX, 2, &CancellationToken::new())?;
    println!(
        "  Paged verification (page size 2): {} entries, intact = {}, complete = {}",
        paged.entries_checked,
        paged.is_intact(),
        paged.complete
    );
    println!();
    Ok(())
}

/// Verify every tenant chain in the ledger.
pub fn print_final_verification(ledger: &Ledger) -> IsmsResult<()> {
    println!("=== Ledger verification ===");
    println!();
    for tenant in ledger.store.tenants()? {
        let report = ledger.trail.verify_full_chain(&tenant)?;
        println!(
            "  {:<14} {} entries  {}",
            tenant,
            report.entries_checked,
            if report.is_intact() { "INTACT" } else { "BROKEN" }
        );
        for breach in &report.breaches {
            println!("    {:?} at position {}", breach.kind, breach.position);
        }
    }
    println!();
    Ok(())
}
