//! # isms-contracts
//!
//! Shared types, wire formats, and errors for the ISMS compliance engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, serde formats, and error types.

pub mod classification;
pub mod error;
pub mod event;
pub mod package;
pub mod risk;
pub mod secret;

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use classification::Classification;
    use error::IsmsError;
    use event::{AuditEntry, AuditQuery, SecurityEvent, GENESIS_HASH};
    use package::{EncryptedPackage, ALGORITHM_AES_256_GCM};
    use risk::RiskLevel;
    use secret::MasterSecret;

    fn make_entry() -> AuditEntry {
        AuditEntry {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: "data_access".to_string(),
            user_id: "u-1".to_string(),
            tenant_id: "acme".to_string(),
            resource_type: "customer".to_string(),
            resource_id: "c-9".to_string(),
            action: "read".to_string(),
            details: Default::default(),
            ip_address: None,
            user_agent: None,
            session_id: Some("s-1".to_string()),
            compliance_flags: ["GDPR_DATA_PROCESSING".to_string()].into_iter().collect(),
            risk_score: 2,
            integrity_hash: "ab".repeat(32),
            previous_hash: GENESIS_HASH.to_string(),
        }
    }

    // ── Classification ───────────────────────────────────────────────────────

    #[test]
    fn classification_orders_by_sensitivity() {
        assert!(Classification::Public < Classification::Internal);
        assert!(Classification::Internal < Classification::Confidential);
        assert!(Classification::Confidential < Classification::Restricted);
    }

    #[test]
    fn classification_parses_case_insensitively() {
        assert_eq!(
            "Restricted".parse::<Classification>().unwrap(),
            Classification::Restricted
        );
        assert!("secret".parse::<Classification>().is_err());
    }

    #[test]
    fn classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Confidential).unwrap();
        assert_eq!(json, "\"confidential\"");
    }

    #[test]
    fn risk_level_serializes_uppercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
    }

    // ── Wire formats ─────────────────────────────────────────────────────────

    #[test]
    fn audit_entry_wire_format_omits_absent_context() {
        let entry = make_entry();
        let value = serde_json::to_value(&entry).unwrap();

        assert!(value.get("ip_address").is_none());
        assert!(value.get("user_agent").is_none());
        assert_eq!(value["session_id"], json!("s-1"));
        assert_eq!(value["compliance_flags"], json!(["GDPR_DATA_PROCESSING"]));
        assert_eq!(value["previous_hash"], json!(GENESIS_HASH));
    }

    #[test]
    fn encrypted_package_encodes_binary_fields_as_base64() {
        let package = EncryptedPackage {
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
            key_id: "internal-m1-0011223344556677-g1".to_string(),
            auth_tag: vec![0u8; 16],
            iv: vec![1u8; 12],
            algorithm: ALGORITHM_AES_256_GCM.to_string(),
            encrypted_at: Utc::now(),
            classification: Classification::Internal,
            tenant_id: "acme".to_string(),
            purpose: "backup".to_string(),
            integrity_hash: "00".repeat(32),
        };

        let value = serde_json::to_value(&package).unwrap();
        assert_eq!(value["ciphertext"], json!("3q2+7w=="));
        assert_eq!(value["classification"], json!("internal"));

        let decoded: EncryptedPackage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, package);
    }

    #[test]
    fn encrypted_package_rejects_invalid_base64() {
        let value = json!({
            "ciphertext": "not base64!!",
            "key_id": "k",
            "auth_tag": "",
            "iv": "",
            "algorithm": "AES-256-GCM",
            "encrypted_at": "2026-01-01T00:00:00Z",
            "classification": "public",
            "tenant_id": "t",
            "purpose": "p",
            "integrity_hash": ""
        });
        assert!(serde_json::from_value::<EncryptedPackage>(value).is_err());
    }

    // ── AuditQuery ───────────────────────────────────────────────────────────

    #[test]
    fn audit_query_matches_populated_filters_only() {
        let entry = make_entry();

        assert!(AuditQuery::for_tenant("acme").matches(&entry));
        assert!(!AuditQuery::for_tenant("globex").matches(&entry));

        let by_flag = AuditQuery {
            compliance_flag: Some("GDPR_DATA_PROCESSING".to_string()),
            ..AuditQuery::for_tenant("acme")
        };
        assert!(by_flag.matches(&entry));

        let by_risk = AuditQuery {
            min_risk_score: Some(5),
            ..AuditQuery::for_tenant("acme")
        };
        assert!(!by_risk.matches(&entry));
    }

    #[test]
    fn security_event_builder_sets_optional_context() {
        let event = SecurityEvent::new("login_failure", "u", "t", "session", "s", "login")
            .with_ip("10.0.0.1")
            .with_detail("reason", json!("bad password"));

        assert_eq!(event.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(event.details["reason"], json!("bad password"));
        assert!(event.occurred_at.is_none());
    }

    // ── MasterSecret ─────────────────────────────────────────────────────────

    #[test]
    fn master_secret_rejects_short_input() {
        match MasterSecret::new(1, vec![7u8; 16]) {
            Err(IsmsError::ConfigError { reason }) => assert!(reason.contains("at least 32")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn master_secret_debug_is_redacted() {
        let secret = MasterSecret::new(3, vec![0x41u8; 32]).unwrap();
        let rendered = format!("{:?}", secret);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("65"));
        assert_eq!(secret.salt().len(), 16);
        assert_eq!(secret.version(), 3);
    }

    // ── IsmsError ────────────────────────────────────────────────────────────

    #[test]
    fn error_key_expired_display() {
        let err = IsmsError::KeyExpired {
            key_id: "restricted-m1-abcd-g1".to_string(),
        };
        assert!(err.to_string().contains("restricted-m1-abcd-g1"));
    }

    #[test]
    fn error_chain_conflict_display() {
        let err = IsmsError::ChainConflict {
            tenant_id: "acme".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("acme"));
        assert!(msg.contains("aa"));
        assert!(msg.contains("bb"));
    }

    #[test]
    fn only_retryable_collaborator_errors_are_retryable() {
        assert!(IsmsError::Collaborator {
            reason: "timeout".to_string(),
            retryable: true
        }
        .is_retryable());
        assert!(!IsmsError::Collaborator {
            reason: "bad request".to_string(),
            retryable: false
        }
        .is_retryable());
        assert!(!IsmsError::Integrity {
            reason: "mismatch".to_string()
        }
        .is_retryable());
    }
}
