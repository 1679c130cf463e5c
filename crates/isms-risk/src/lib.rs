//! # isms-risk
//!
//! Quantitative risk assessment for the ISMS compliance engine.
//!
//! ## Overview
//!
//! An asset's impact comes from its business value scaled by its
//! classification; its likelihood comes from the catalog threats relevant
//! to its type, amplified by the worst relevant vulnerability. Their
//! product (1–25) is bucketed into a `RiskLevel` that drives the
//! mitigation checklist and the next review date. All tables come from
//! `RiskPolicy`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use isms_policy::RiskPolicy;
//! use isms_risk::{InMemoryAssessmentStore, RiskAssessmentEngine, StaticAssetRegistry};
//!
//! let engine = RiskAssessmentEngine::new(
//!     Arc::new(StaticAssetRegistry::from_assets(assets)),
//!     Arc::new(InMemoryAssessmentStore::new()),
//!     RiskPolicy::default(),
//! );
//! let assessment = engine.assess_asset("db-01", "acme")?;
//! let dashboard = engine.dashboard("acme")?;
//! ```

pub mod engine;
pub mod memory;
pub mod scoring;

pub use engine::RiskAssessmentEngine;
pub use memory::{InMemoryAssessmentStore, StaticAssetRegistry};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;

    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use isms_contracts::{
        classification::Classification,
        error::{IsmsError, IsmsResult},
        event::SecurityEvent,
        risk::{Asset, RiskLevel, Threat, Vulnerability},
    };
    use isms_core::{
        retry::RetryPolicy,
        traits::{AssessmentStore, AssetRegistry, SecurityEventSink},
    };
    use isms_policy::{Relevance, RiskPolicy};

    use super::{InMemoryAssessmentStore, RiskAssessmentEngine, StaticAssetRegistry};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn asset(id: &str, asset_type: &str, classification: Classification, value: u8) -> Asset {
        Asset {
            asset_id: id.to_string(),
            tenant_id: "acme".to_string(),
            name: format!("{id} ({asset_type})"),
            asset_type: asset_type.to_string(),
            classification,
            business_value: value,
        }
    }

    /// A catalog where `database` faces two likelihood-3 threats and one
    /// severity-4 vulnerability.
    fn scenario_policy() -> RiskPolicy {
        let mut relevance = BTreeMap::new();
        relevance.insert(
            "database".to_string(),
            Relevance {
                threats: vec!["breach".to_string(), "injection".to_string()],
                vulnerabilities: vec!["plaintext".to_string()],
            },
        );
        RiskPolicy {
            threats: vec![
                Threat {
                    id: "breach".to_string(),
                    name: "External data breach".to_string(),
                    likelihood: 3,
                },
                Threat {
                    id: "injection".to_string(),
                    name: "Injection attack".to_string(),
                    likelihood: 3,
                },
            ],
            vulnerabilities: vec![Vulnerability {
                id: "plaintext".to_string(),
                name: "Unencrypted data at rest".to_string(),
                severity: 4,
            }],
            relevance,
            ..RiskPolicy::default()
        }
    }

    fn make_engine(policy: RiskPolicy, assets: Vec<Asset>) -> (Arc<InMemoryAssessmentStore>, RiskAssessmentEngine) {
        let store = Arc::new(InMemoryAssessmentStore::new());
        let engine = RiskAssessmentEngine::new(
            Arc::new(StaticAssetRegistry::from_assets(assets)),
            store.clone(),
            policy,
        )
        .with_read_retry(RetryPolicy::none());
        (store, engine)
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<SecurityEvent>>,
        fail: bool,
    }

    impl SecurityEventSink for RecordingSink {
        fn record(&self, event: SecurityEvent) -> IsmsResult<Uuid> {
            if self.fail {
                return Err(IsmsError::AuditWriteFailed {
                    reason: "ledger offline".to_string(),
                });
            }
            self.events.lock().unwrap().push(event);
            Ok(Uuid::new_v4())
        }
    }

    /// Fails the first `failures` lookups with a transient error.
    struct FlakyRegistry {
        inner: StaticAssetRegistry,
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    impl AssetRegistry for FlakyRegistry {
        fn get_asset(&self, asset_id: &str, tenant_id: &str) -> IsmsResult<Option<Asset>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(IsmsError::Collaborator {
                    reason: "registry timeout".to_string(),
                    retryable: true,
                });
            }
            self.inner.get_asset(asset_id, tenant_id)
        }
    }

    // ── 1. scoring ────────────────────────────────────────────────────────────

    /// Value 8, confidential, threats 3/3, vulnerability 4 → 5 × 5 = 25.
    #[test]
    fn test_scenario_critical_database() {
        let (_store, engine) = make_engine(
            scenario_policy(),
            vec![asset("db-01", "database", Classification::Confidential, 8)],
        );
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

        let a = engine.assess_asset_at("db-01", "acme", now).unwrap();

        assert_eq!(a.impact_score, 5);
        assert_eq!(a.likelihood_score, 5);
        assert_eq!(a.risk_score, 25);
        assert_eq!(a.risk_level, RiskLevel::Critical);
        assert_eq!(a.next_assessment_due, now + Duration::days(30));
        assert!(a.mitigation_required);
        assert_eq!(a.required_mitigations[0].deadline_hours, Some(24));
        assert!(a
            .required_mitigations
            .iter()
            .any(|m| m.sign_off.as_deref() == Some("board")));
        assert_eq!(a.threats.len(), 2);
        assert_eq!(a.vulnerabilities.len(), 1);
        assert!(a.compliance.data_protection);
    }

    /// Risk never decreases as business value grows, and restricted is never
    /// below public.
    #[test]
    fn test_monotonic_in_value_and_classification() {
        let mut assets = Vec::new();
        for class in Classification::ALL {
            for value in 1..=10 {
                assets.push(asset(&format!("{class}-{value}"), "database", class, value));
            }
        }
        let (_store, engine) = make_engine(RiskPolicy::default(), assets);

        let score = |class: Classification, value: u8| {
            engine
                .assess_asset(&format!("{class}-{value}"), "acme")
                .unwrap()
        };

        for class in Classification::ALL {
            let mut previous = 0;
            for value in 1..=10 {
                let risk = score(class, value).risk_score;
                assert!(risk >= previous, "{class} value {value}: {risk} < {previous}");
                previous = risk;
            }
        }
        for value in 1..=10 {
            let restricted = score(Classification::Restricted, value);
            let public = score(Classification::Public, value);
            assert!(restricted.impact_score >= public.impact_score);
            assert!(restricted.risk_score >= public.risk_score);
        }
    }

    /// Asset types with no catalog entries floor likelihood at 1.
    #[test]
    fn test_empty_catalog_floors_likelihood() {
        let empty = RiskPolicy {
            threats: Vec::new(),
            vulnerabilities: Vec::new(),
            relevance: BTreeMap::new(),
            ..RiskPolicy::default()
        };
        let (_store, engine) = make_engine(
            empty,
            vec![asset("kiosk", "coffee_machine", Classification::Public, 3)],
        );

        let a = engine.assess_asset("kiosk", "acme").unwrap();
        assert_eq!(a.likelihood_score, 1);
        assert_eq!(a.risk_score, 3);
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert!(!a.mitigation_required);
        assert!(a.threats.is_empty());
        assert_eq!(a.required_mitigations.len(), 1);
        assert_eq!(a.required_mitigations[0].sign_off.as_deref(), Some("risk_owner"));
    }

    /// The mitigation threshold moves independently of the level boundaries.
    #[test]
    fn test_mitigation_threshold_is_independent() {
        // impact 4 (value 4, public) × likelihood 3 = 12 → HIGH
        let mut policy = scenario_policy();
        policy.vulnerabilities[0].severity = 0;
        let assets = vec![asset("db-02", "database", Classification::Public, 4)];

        let (_store, engine) = make_engine(policy.clone(), assets.clone());
        let a = engine.assess_asset("db-02", "acme").unwrap();
        assert_eq!(a.risk_score, 12);
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(a.mitigation_required);

        policy.mitigation_threshold = 15;
        let (_store, engine) = make_engine(policy, assets);
        let a = engine.assess_asset("db-02", "acme").unwrap();
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(!a.mitigation_required);
        assert_eq!(a.required_mitigations, engine.policy().mitigations_for(RiskLevel::High));
    }

    /// Every level carries its own checklist, LOW included, whether or not
    /// the score crosses the mitigation threshold.
    #[test]
    fn test_checklist_follows_risk_level() {
        let mut policy = scenario_policy();
        policy.vulnerabilities[0].severity = 0;
        let (_store, engine) = make_engine(
            policy,
            vec![
                asset("kiosk", "coffee_machine", Classification::Public, 2),
                asset("replica", "database", Classification::Public, 2),
            ],
        );

        let low = engine.assess_asset("kiosk", "acme").unwrap();
        assert_eq!(low.risk_level, RiskLevel::Low);
        assert!(!low.mitigation_required);
        assert!(!low.required_mitigations.is_empty());
        assert_eq!(low.required_mitigations[0].action, "Document risk acceptance");

        // impact 2 × likelihood 3 = 6 → MEDIUM, below the threshold of 10
        let medium = engine.assess_asset("replica", "acme").unwrap();
        assert_eq!(medium.risk_level, RiskLevel::Medium);
        assert!(!medium.mitigation_required);
        assert_eq!(
            medium.required_mitigations,
            engine.policy().mitigations_for(RiskLevel::Medium)
        );
        assert_eq!(medium.required_mitigations.len(), 2);
    }

    // ── 2. failure modes ──────────────────────────────────────────────────────

    #[test]
    fn test_unknown_asset_not_found() {
        let (store, engine) = make_engine(
            RiskPolicy::default(),
            vec![asset("db-01", "database", Classification::Internal, 5)],
        );

        for (id, tenant) in [("ghost", "acme"), ("db-01", "globex")] {
            match engine.assess_asset(id, tenant) {
                Err(IsmsError::NotFound { kind, .. }) => assert_eq!(kind, "asset"),
                other => panic!("expected NotFound, got {:?}", other),
            }
        }
        assert!(engine.history("ghost", "acme").unwrap().is_empty());
        assert!(store.latest_per_asset("acme").unwrap().is_empty());
    }

    #[test]
    fn test_business_value_out_of_range() {
        let (_store, engine) = make_engine(
            RiskPolicy::default(),
            vec![
                asset("zero", "server", Classification::Internal, 0),
                asset("eleven", "server", Classification::Internal, 11),
            ],
        );
        for id in ["zero", "eleven"] {
            assert!(matches!(
                engine.assess_asset(id, "acme"),
                Err(IsmsError::Validation { .. })
            ));
        }
    }

    /// Transient registry failures are retried on the read path.
    #[test]
    fn test_registry_lookup_retried() {
        let registry = Arc::new(FlakyRegistry {
            inner: StaticAssetRegistry::from_assets(vec![asset(
                "srv-1",
                "server",
                Classification::Internal,
                5,
            )]),
            failures: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        });
        let engine = RiskAssessmentEngine::new(
            registry.clone(),
            Arc::new(InMemoryAssessmentStore::new()),
            RiskPolicy::default(),
        )
        .with_read_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: StdDuration::ZERO,
            max_backoff: StdDuration::ZERO,
        });

        assert!(engine.assess_asset("srv-1", "acme").is_ok());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    // ── 3. history and dashboard ──────────────────────────────────────────────

    #[test]
    fn test_history_and_dashboard_use_latest() {
        let registry = Arc::new(StaticAssetRegistry::from_assets(vec![
            asset("db-01", "database", Classification::Confidential, 8),
            asset("kiosk", "coffee_machine", Classification::Public, 1),
        ]));
        let engine = RiskAssessmentEngine::new(
            registry.clone(),
            Arc::new(InMemoryAssessmentStore::new()),
            scenario_policy(),
        );
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

        engine.assess_asset_at("db-01", "acme", t0).unwrap();
        engine.assess_asset_at("kiosk", "acme", t0).unwrap();

        // db-01 is downgraded and reassessed a week later.
        registry
            .upsert(asset("db-01", "database", Classification::Public, 1))
            .unwrap();
        engine
            .assess_asset_at("db-01", "acme", t0 + Duration::days(7))
            .unwrap();

        let history = engine.history("db-01", "acme").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].risk_level, RiskLevel::Critical);
        assert!(history[1].risk_score < history[0].risk_score);

        let dashboard = engine.dashboard_at("acme", t0 + Duration::days(8)).unwrap();
        assert_eq!(dashboard.assessed_assets, 2);
        assert_eq!(dashboard.critical, 0);
        assert_eq!(dashboard.low, 2);
        assert_eq!(dashboard.overdue_reviews, 0);

        let much_later = engine.dashboard_at("acme", t0 + Duration::days(400)).unwrap();
        assert_eq!(much_later.overdue_reviews, 2);

        assert_eq!(engine.dashboard("globex").unwrap().assessed_assets, 0);
    }

    #[test]
    fn test_parallel_assessment_keeps_order() {
        let mut assets: Vec<Asset> = (1..=10)
            .map(|v| asset(&format!("a-{v}"), "server", Classification::Internal, v))
            .collect();
        assets.push(asset("bad", "server", Classification::Internal, 0));
        let (store, engine) = make_engine(RiskPolicy::default(), assets);

        let mut ids: Vec<String> = (1..=10).map(|v| format!("a-{v}")).collect();
        ids.insert(3, "missing".to_string());
        ids.push("bad".to_string());

        let results = engine.assess_assets(&ids, "acme");

        assert_eq!(results.len(), ids.len());
        for (id, result) in ids.iter().zip(&results) {
            match (id.as_str(), result) {
                ("missing", Err(IsmsError::NotFound { .. })) => {}
                ("bad", Err(IsmsError::Validation { .. })) => {}
                (_, Ok(a)) => assert_eq!(&a.asset_id, id),
                (_, other) => panic!("unexpected result for {id}: {:?}", other),
            }
        }
        assert_eq!(store.latest_per_asset("acme").unwrap().len(), 10);
        assert!(engine.assess_assets(&[], "acme").is_empty());
    }

    // ── 4. audit coupling ─────────────────────────────────────────────────────

    #[test]
    fn test_assessment_recorded_in_ledger() {
        let sink = Arc::new(RecordingSink::default());
        let (_store, engine) = make_engine(
            scenario_policy(),
            vec![asset("db-01", "database", Classification::Confidential, 8)],
        );
        let engine = engine.with_event_sink(sink.clone());

        let a = engine.assess_asset("db-01", "acme").unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "risk_assessment");
        assert_eq!(events[0].resource_id, "db-01");
        assert_eq!(events[0].details["risk_score"], 25);
        assert_eq!(events[0].details["risk_level"], "CRITICAL");
        assert_eq!(events[0].details["assessment_id"], a.id.to_string());
    }

    #[test]
    fn test_unrecorded_assessment_fails() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let (store, engine) = make_engine(
            scenario_policy(),
            vec![asset("db-01", "database", Classification::Confidential, 8)],
        );
        let engine = engine.with_event_sink(sink);

        assert!(matches!(
            engine.assess_asset("db-01", "acme"),
            Err(IsmsError::AuditWriteFailed { .. })
        ));
        assert_eq!(store.history("acme", "db-01").unwrap().len(), 1);
    }
}
