//! Scenario 3: Risk Assessment
//!
//! Scores the tenant's asset inventory in parallel, prints each assessment
//! with its treatment checklist, then the tenant dashboard as of today and
//! as of a year from now, when every review is overdue.

use std::sync::Arc;

use chrono::{Duration, Utc};

use isms_audit::AuditTrail;
use isms_contracts::error::IsmsResult;
use isms_policy::PolicyConfig;
use isms_risk::{InMemoryAssessmentStore, RiskAssessmentEngine, StaticAssetRegistry};

use crate::mock_data::{assets, TENANT};

pub fn run_scenario(policy: &PolicyConfig, ledger: Option<Arc<AuditTrail>>) -> IsmsResult<()> {
    println!("=== Scenario 3: Risk Assessment ===");
    println!();

    let registry = Arc::new(StaticAssetRegistry::from_assets(assets()));
    let mut engine = RiskAssessmentEngine::new(
        registry.clone(),
        Arc::new(InMemoryAssessmentStore::new()),
        policy.risk.clone(),
    );
    if let Some(trail) = ledger {
        engine = engine.with_event_sink(trail);
    }

    let ids = registry.asset_ids(TENANT)?;
    let now = Utc::now();
    for result in engine.assess_assets_at(&ids, TENANT, now) {
        let a = result?;
        println!(
            "  {:<11} impact {} x likelihood {} = {:>2}  {:<8} review by {}  [{}]",
            a.asset_id,
            a.impact_score,
            a.likelihood_score,
            a.risk_score,
            a.risk_level.to_string(),
            a.next_assessment_due.format("%Y-%m-%d"),
            a.compliance.frameworks.join(", ")
        );
        for mitigation in &a.required_mitigations {
            let due = mitigation
                .deadline_hours
                .map_or_else(|| "ongoing".to_string(), |h| format!("within {h}h"));
            match &mitigation.sign_off {
                Some(role) => println!("      - {} ({due}, sign-off: {role})", mitigation.action),
                None => println!("      - {} ({due})", mitigation.action),
            }
        }
    }
    println!();

    for (label, at) in [("today", now), ("in one year", now + Duration::days(366))] {
        let d = engine.dashboard_at(TENANT, at)?;
        println!(
            "  Dashboard {:<12} assets {}  critical {}  high {}  medium {}  low {}  mitigation {}  overdue {}",
            label, d.assessed_assets, d.critical, d.high, d.medium, d.low, d.mitigation_required, d.overdue_reviews
        );
    }
    println!();
    Ok(())
}
