//! Collaborator trait definitions for the ISMS engine.
//!
//! These traits are the complete boundary between the compliance core and
//! the rest of the application:
//!
//! - `AuditStore`          : durable, append-only ledger storage
//! - `AlertSink`           : delivery of critical-event alerts
//! - `SecurityEventSink`   : anything that can record a security event
//! - `AssetRegistry`       : asset metadata lookup
//! - `AssessmentStore`     : append-only risk assessment history
//! - `MasterSecretProvider`: versioned master secret provisioning
//!
//! The core never performs network I/O itself; implementations of these
//! traits may block, and callers are expected to apply their own timeouts.

use std::sync::Arc;

use uuid::Uuid;

use isms_contracts::{
    error::IsmsResult,
    event::{AuditEntry, AuditQuery, SecurityAlert, SecurityEvent},
    risk::{Asset, RiskAssessment},
    secret::MasterSecret,
};

/// Durable storage for tenant hash chains.
///
/// The store owns the chain head. `append` is the only way to move it and
/// must behave as an atomic compare-and-swap: the entry is accepted only if
/// its `previous_hash` equals the tenant's current head, otherwise
/// `IsmsError::ChainConflict` is returned and nothing is written.
pub trait AuditStore: Send + Sync {
    /// Atomically append `entry` to its tenant chain.
    fn append(&self, entry: &AuditEntry) -> IsmsResult<()>;

    /// Return the tenant's chain head, or `GENESIS_HASH` for an empty chain.
    fn fetch_last_hash(&self, tenant_id: &str) -> IsmsResult<String>;

    /// Return entries at positions `start..end` of the tenant chain, in
    /// chain order. `end` past the chain length is clamped.
    fn fetch_range(&self, tenant_id: &str, start: usize, end: usize)
        -> IsmsResult<Vec<AuditEntry>>;

    /// Number of entries in the tenant chain.
    fn chain_len(&self, tenant_id: &str) -> IsmsResult<usize>;

    /// Return entries matching `query`, in chain order.
    fn query(&self, query: &AuditQuery) -> IsmsResult<Vec<AuditEntry>>;
}

/// The alerting collaborator.
///
/// Failures are logged by the caller and never abort the audit write that
/// triggered the alert.
pub trait AlertSink: Send + Sync {
    fn send_alert(&self, alert: &SecurityAlert) -> IsmsResult<()>;
}

/// Something that records security events, typically the audit trail.
///
/// Lets the encryption service and risk engine write to the ledger without
/// depending on the audit crate.
pub trait SecurityEventSink: Send + Sync {
    /// Record `event` and return the id of the resulting ledger entry.
    fn record(&self, event: SecurityEvent) -> IsmsResult<Uuid>;
}

/// The asset-registry collaborator.
pub trait AssetRegistry: Send + Sync {
    /// Look up an asset. `Ok(None)` means the asset does not exist for this
    /// tenant; `Err` means the registry itself failed.
    fn get_asset(&self, asset_id: &str, tenant_id: &str) -> IsmsResult<Option<Asset>>;
}

/// Append-only storage for risk assessments.
pub trait AssessmentStore: Send + Sync {
    fn append(&self, assessment: &RiskAssessment) -> IsmsResult<()>;

    /// Every assessment of one asset, oldest first.
    fn history(&self, tenant_id: &str, asset_id: &str) -> IsmsResult<Vec<RiskAssessment>>;

    /// The most recent assessment of each asset the tenant has assessed.
    fn latest_per_asset(&self, tenant_id: &str) -> IsmsResult<Vec<RiskAssessment>>;
}

/// Supplies master secrets by version.
///
/// Every version ever used to issue a key must stay resolvable for as long
/// as payloads encrypted under it must remain readable.
pub trait MasterSecretProvider: Send + Sync {
    /// The version new keys are issued under.
    fn current(&self) -> IsmsResult<Arc<MasterSecret>>;

    /// A specific version, or `IsmsError::NotFound`.
    fn version(&self, version: u32) -> IsmsResult<Arc<MasterSecret>>;
}
