//! Encrypted payload wire format and the request contexts around it.
//!
//! Binary fields travel as standard base64; the integrity hash travels as
//! lowercase hex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::Classification;

/// The only algorithm the engine emits.
pub const ALGORITHM_AES_256_GCM: &str = "AES-256-GCM";

/// A self-describing encrypted payload.
///
/// Everything needed to decrypt is carried here except the master secret:
/// the key is re-derived from `key_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPackage {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    pub key_id: String,
    #[serde(with = "b64")]
    pub auth_tag: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    pub algorithm: String,
    pub encrypted_at: DateTime<Utc>,
    pub classification: Classification,
    pub tenant_id: String,
    pub purpose: String,
    /// SHA-256 hex over `ciphertext ‖ auth_tag ‖ iv`.
    pub integrity_hash: String,
}

/// Who the payload is for and why; selects the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionContext {
    pub classification: Classification,
    pub tenant_id: String,
    pub purpose: String,
}

impl EncryptionContext {
    pub fn new(
        classification: Classification,
        tenant_id: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            classification,
            tenant_id: tenant_id.into(),
            purpose: purpose.into(),
        }
    }
}

/// The caller asking to decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub actor_id: String,
    pub actor_role: String,
    pub tenant_id: String,
}

impl AccessContext {
    pub fn new(
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_role: actor_role.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// A key identifier replaced by a successor during rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedKey {
    pub previous: String,
    pub successor: String,
}

/// A key rotation attempt that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationFailure {
    pub key_id: String,
    pub reason: String,
}

/// Summary of one `rotate_keys` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationReport {
    /// Active keys inspected.
    pub checked: usize,
    pub rotated: Vec<RotatedKey>,
    pub errors: Vec<RotationFailure>,
}

/// Serde adapter for base64-encoded byte fields.
pub mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
