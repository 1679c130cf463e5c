//! `RiskAssessmentEngine`: per-asset assessments, history and dashboards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::SecurityEvent,
    risk::{RiskAssessment, RiskDashboard, RiskLevel},
};
use isms_core::{
    retry::{retry_read, RetryPolicy},
    traits::{AssessmentStore, AssetRegistry, SecurityEventSink},
};
use isms_policy::RiskPolicy;

use crate::scoring::{compliance_snapshot, impact_score, likelihood_score, BUSINESS_VALUE_RANGE};

/// Scores assets against the threat and vulnerability catalogs.
pub struct RiskAssessmentEngine {
    assets: Arc<dyn AssetRegistry>,
    store: Arc<dyn AssessmentStore>,
    policy: RiskPolicy,
    events: Option<Arc<dyn SecurityEventSink>>,
    read_retry: RetryPolicy,
}

impl RiskAssessmentEngine {
    pub fn new(
        assets: Arc<dyn AssetRegistry>,
        store: Arc<dyn AssessmentStore>,
        policy: RiskPolicy,
    ) -> Self {
        Self {
            assets,
            store,
            policy,
            events: None,
            read_retry: RetryPolicy::default(),
        }
    }

    /// Record each assessment in the audit ledger as a `risk_assessment`
    /// event.
    pub fn with_event_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn assess_asset(&self, asset_id: &str, tenant_id: &str) -> IsmsResult<RiskAssessment> {
        self.assess_asset_at(asset_id, tenant_id, Utc::now())
    }

    /// Assess `asset_id` as of `now`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the registry has no such asset for the tenant.
    /// - `Validation` if its business value is outside 1–10.
    /// - `AuditWriteFailed` if the assessment could not be recorded in the
    ///   ledger; it is still kept in the assessment store.
    pub fn assess_asset_at(
        &self,
        asset_id: &str,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> IsmsResult<RiskAssessment> {
        let asset = retry_read(&self.read_retry, "get_asset", || {
            self.assets.get_asset(asset_id, tenant_id)
        })?
        .ok_or_else(|| IsmsError::NotFound {
            kind: "asset".to_string(),
            id: format!("{tenant_id}/{asset_id}"),
        })?;

        if !BUSINESS_VALUE_RANGE.contains(&asset.business_value) {
            return Err(IsmsError::Validation {
                reason: format!(
                    "asset '{}' has business value {}, expected 1-10",
                    asset.asset_id, asset.business_value
                ),
            });
        }

        let threats = self.policy.threats_for(&asset.asset_type);
        let vulnerabilities = self.policy.vulnerabilities_for(&asset.asset_type);

        let impact = impact_score(
            asset.business_value,
            self.policy.multiplier(asset.classification),
        );
        let likelihood = likelihood_score(&threats, &vulnerabilities);
        let risk_score = impact * likelihood;
        let risk_level = self.policy.level_for(risk_score);
        let mitigation_required = self.policy.requires_mitigation(risk_score);

        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            asset_id: asset.asset_id.clone(),
            tenant_id: asset.tenant_id.clone(),
            impact_score: impact,
            likelihood_score: likelihood,
            risk_score,
            risk_level,
            threats,
            vulnerabilities,
            mitigation_required,
            required_mitigations: self.policy.mitigations_for(risk_level),
            assessed_at: now,
            next_assessment_due: now + self.policy.review_interval(risk_level),
            compliance: compliance_snapshot(&self.policy, &asset),
        };

        self.store.append(&assessment)?;

        info!(
            tenant_id = %assessment.tenant_id,
            asset_id = %assessment.asset_id,
            impact,
            likelihood,
            risk_score,
            risk_level = %risk_level,
            mitigation_required,
            "asset assessed"
        );

        if let Some(sink) = &self.events {
            let event = SecurityEvent::new(
                "risk_assessment",
                "risk_engine",
                assessment.tenant_id.as_str(),
                "asset",
                assessment.asset_id.as_str(),
                "assess",
            )
            .at(now)
            .with_detail("assessment_id", json!(assessment.id))
            .with_detail("risk_score", json!(risk_score))
            .with_detail("risk_level", json!(risk_level))
            .with_detail("mitigation_required", json!(mitigation_required));
            sink.record(event).map_err(|e| IsmsError::AuditWriteFailed {
                reason: format!("assessment not recorded: {e}"),
            })?;
        }

        Ok(assessment)
    }

    /// Assess several assets of one tenant in parallel.
    ///
    /// Results are returned in input order; one asset failing does not
    /// affect the others.
    pub fn assess_assets(
        &self,
        asset_ids: &[String],
        tenant_id: &str,
    ) -> Vec<IsmsResult<RiskAssessment>> {
        self.assess_assets_at(asset_ids, tenant_id, Utc::now())
    }

    pub fn assess_assets_at(
        &self,
        asset_ids: &[String],
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<IsmsResult<RiskAssessment>> {
        if asset_ids.is_empty() {
            return Vec::new();
        }
        let workers = std::thread::available_parallelism()
            .map_or(4, |n| n.get())
            .min(asset_ids.len());
        let chunk = asset_ids.len().div_ceil(workers);
        debug!(assets = asset_ids.len(), workers, "assessing assets in parallel");

        std::thread::scope(|s| {
            let handles: Vec<_> = asset_ids
                .chunks(chunk)
                .map(|ids| {
                    s.spawn(move || {
                        ids.iter()
                            .map(|id| self.assess_asset_at(id, tenant_id, now))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(asset_ids.chunks(chunk))
                .flat_map(|(handle, ids)| match handle.join() {
                    Ok(results) => results,
                    Err(_) => ids
                        .iter()
                        .map(|id| {
                            Err(IsmsError::Collaborator {
                                reason: format!("assessment worker for '{id}' panicked"),
                                retryable: false,
                            })
                        })
                        .collect(),
                })
                .collect()
        })
    }

    /// Every stored assessment of one asset, oldest first.
    pub fn history(&self, asset_id: &str, tenant_id: &str) -> IsmsResult<Vec<RiskAssessment>> {
        retry_read(&self.read_retry, "assessment_history", || {
            self.store.history(tenant_id, asset_id)
        })
    }

    pub fn dashboard(&self, tenant_id: &str) -> IsmsResult<RiskDashboard> {
        self.dashboard_at(tenant_id, Utc::now())
    }

    /// Aggregate the latest assessment of each asset as of `now`.
    pub fn dashboard_at(&self, tenant_id: &str, now: DateTime<Utc>) -> IsmsResult<RiskDashboard> {
        let latest = retry_read(&self.read_retry, "latest_assessments", || {
            self.store.latest_per_asset(tenant_id)
        })?;

        let mut dashboard = RiskDashboard {
            tenant_id: tenant_id.to_string(),
            assessed_assets: latest.len(),
            ..RiskDashboard::default()
        };
        for assessment in &latest {
            match assessment.risk_level {
                RiskLevel::Low => dashboard.low += 1,
                RiskLevel::Medium => dashboard.medium += 1,
                RiskLevel::High => dashboard.high += 1,
                RiskLevel::Critical => dashboard.critical += 1,
            }
            if assessment.mitigation_required {
                dashboard.mitigation_required += 1;
            }
            if assessment.next_assessment_due < now {
                dashboard.overdue_reviews += 1;
            }
        }
        Ok(dashboard)
    }
}
