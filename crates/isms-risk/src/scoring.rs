//! Pure scoring functions.
//!
//! ```text
//! impact     = min(round(business_value × classification_multiplier), 5)
//! likelihood = min(round(avg(threat.likelihood) × (1 + max(vuln.severity) / 5)), 5)
//! risk       = impact × likelihood
//! ```
//!
//! Rounding is half-to-even. Likelihood is 1 when no threat applies, and a
//! missing vulnerability set contributes no amplification.

use isms_contracts::{
    classification::Classification,
    risk::{Asset, ComplianceSnapshot, Threat, Vulnerability},
};
use isms_policy::RiskPolicy;

/// Upper bound of both impact and likelihood.
pub const MAX_FACTOR: u8 = 5;

/// Business value accepted from the asset registry.
pub const BUSINESS_VALUE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

pub fn impact_score(business_value: u8, multiplier: f64) -> u8 {
    clamp_factor((f64::from(business_value) * multiplier).round_ties_even())
}

pub fn likelihood_score(threats: &[Threat], vulnerabilities: &[Vulnerability]) -> u8 {
    if threats.is_empty() {
        return 1;
    }
    let total: u32 = threats.iter().map(|t| u32::from(t.likelihood)).sum();
    let average = f64::from(total) / threats.len() as f64;
    let max_severity = vulnerabilities.iter().map(|v| v.severity).max().unwrap_or(0);
    let amplified = average * (1.0 + f64::from(max_severity) / 5.0);
    clamp_factor(amplified.round_ties_even())
}

/// Which frameworks the asset falls under.
pub fn compliance_snapshot(policy: &RiskPolicy, asset: &Asset) -> ComplianceSnapshot {
    let data_protection = asset.classification >= Classification::Confidential
        || policy.is_personal_data_asset(&asset.asset_type);
    let financial_controls = policy.is_financial_asset(&asset.asset_type);

    let mut frameworks = Vec::new();
    if data_protection {
        frameworks.push("GDPR".to_string());
    }
    if financial_controls {
        frameworks.push("SOX".to_string());
    }
    frameworks.push("ISO27001".to_string());

    ComplianceSnapshot {
        data_protection,
        financial_controls,
        security_management: true,
        frameworks,
    }
}

fn clamp_factor(value: f64) -> u8 {
    value.clamp(1.0, f64::from(MAX_FACTOR)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threats(likelihoods: &[u8]) -> Vec<Threat> {
        likelihoods
            .iter()
            .enumerate()
            .map(|(i, &likelihood)| Threat {
                id: format!("t{i}"),
                name: format!("threat {i}"),
                likelihood,
            })
            .collect()
    }

    fn vulns(severities: &[u8]) -> Vec<Vulnerability> {
        severities
            .iter()
            .enumerate()
            .map(|(i, &severity)| Vulnerability {
                id: format!("v{i}"),
                name: format!("vulnerability {i}"),
                severity,
            })
            .collect()
    }

    fn asset(asset_type: &str, classification: Classification) -> Asset {
        Asset {
            asset_id: "a-1".to_string(),
            tenant_id: "acme".to_string(),
            name: "thing".to_string(),
            asset_type: asset_type.to_string(),
            classification,
            business_value: 5,
        }
    }

    #[test]
    fn impact_caps_at_five() {
        assert_eq!(impact_score(8, 2.0), 5);
        assert_eq!(impact_score(1, 1.0), 1);
        assert_eq!(impact_score(3, 1.0), 3);
        assert_eq!(impact_score(10, 2.5), 5);
    }

    #[test]
    fn impact_rounds_half_to_even() {
        assert_eq!(impact_score(1, 1.5), 2);
        assert_eq!(impact_score(3, 1.5), 4);
        assert_eq!(impact_score(1, 2.5), 2);
    }

    #[test]
    fn likelihood_amplified_by_worst_vulnerability() {
        assert_eq!(likelihood_score(&threats(&[3, 3]), &vulns(&[4])), 5);
        assert_eq!(likelihood_score(&threats(&[2]), &vulns(&[1, 2])), 3);
        assert_eq!(likelihood_score(&threats(&[2, 3]), &[]), 2);
    }

    #[test]
    fn likelihood_floors_without_threats() {
        assert_eq!(likelihood_score(&[], &vulns(&[5])), 1);
        assert_eq!(likelihood_score(&[], &[]), 1);
    }

    #[test]
    fn snapshot_from_classification_and_type() {
        let policy = RiskPolicy::default();

        let crm = compliance_snapshot(&policy, &asset("crm", Classification::Internal));
        assert!(crm.data_protection);
        assert!(!crm.financial_controls);
        assert_eq!(crm.frameworks, vec!["GDPR", "ISO27001"]);

        let ledger = compliance_snapshot(&policy, &asset("financial_system", Classification::Restricted));
        assert!(ledger.data_protection && ledger.financial_controls && ledger.security_management);
        assert_eq!(ledger.frameworks, vec!["GDPR", "SOX", "ISO27001"]);

        let kiosk = compliance_snapshot(&policy, &asset("endpoint", Classification::Public));
        assert_eq!(kiosk.frameworks, vec!["ISO27001"]);
    }
}
