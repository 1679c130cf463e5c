//! Error types for the ISMS compliance engine.
//!
//! All fallible operations return `IsmsResult<T>`. Variants carry enough
//! context to be written to the audit ledger or surfaced to an operator
//! without further lookups.

use thiserror::Error;

/// The unified error type for the ISMS crates.
#[derive(Debug, Error)]
pub enum IsmsError {
    /// Malformed input, rejected before any hashing or encryption happens.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A stored hash did not match its recomputed value.
    ///
    /// Always surfaced to the caller and never retried.
    #[error("integrity check failed: {reason}")]
    Integrity { reason: String },

    /// The access policy refused the request.
    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    /// Decryption was attempted against a retired key identifier.
    #[error("key '{key_id}' has been retired")]
    KeyExpired { key_id: String },

    /// Another writer extended the tenant chain between our head read and
    /// our append.
    #[error("chain conflict on tenant '{tenant_id}': expected head {expected}, found {actual}")]
    ChainConflict {
        tenant_id: String,
        expected: String,
        actual: String,
    },

    /// An asset, entry, or secret version does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// The audit ledger could not persist an entry.
    ///
    /// Fatal to the triggering call: the event must not be treated as logged.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A collaborator (store, registry, alerting) failed.
    #[error("collaborator failure: {reason}")]
    Collaborator { reason: String, retryable: bool },

    /// A cryptographic primitive failed (cipher setup, AEAD open, bad key).
    #[error("cryptographic failure: {reason}")]
    Crypto { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A value could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl IsmsError {
    /// True for failures worth retrying on a read path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IsmsError::Collaborator { retryable: true, .. })
    }
}

impl From<serde_json::Error> for IsmsError {
    fn from(e: serde_json::Error) -> Self {
        IsmsError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the ISMS crates.
pub type IsmsResult<T> = Result<T, IsmsError>;
