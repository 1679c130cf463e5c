//! In-memory implementation of `AuditStore`.
//!
//! `InMemoryAuditStore` is the reference ledger. It keeps one `Vec` per
//! tenant behind a single `Mutex`; the tenant's chain head is simply the
//! `integrity_hash` of the last entry, and `append` compares the incoming
//! entry's `previous_hash` against it while holding the lock. That makes
//! every append an atomic compare-and-swap on the head.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::{AuditEntry, AuditQuery, GENESIS_HASH},
};
use isms_core::traits::AuditStore;

/// An in-memory, append-only store of per-tenant hash chains.
///
/// # Thread safety
///
/// All operations acquire one internal `Mutex`; the store can be shared
/// across threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    pub(crate) chains: Mutex<HashMap<String, Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tenant with at least one entry, sorted.
    pub fn tenants(&self) -> IsmsResult<Vec<String>> {
        let chains = self.lock()?;
        let mut tenants: Vec<String> = chains.keys().cloned().collect();
        tenants.sort();
        Ok(tenants)
    }

    fn lock(&self) -> IsmsResult<MutexGuard<'_, HashMap<String, Vec<AuditEntry>>>> {
        self.chains.lock().map_err(|e| IsmsError::Collaborator {
            reason: format!("audit store lock poisoned: {}", e),
            retryable: false,
        })
    }
}

impl AuditStore for InMemoryAuditStore {
    /// Append `entry` if its `previous_hash` is the tenant's current head.
    ///
    /// Returns `ChainConflict` without writing anything otherwise.
    fn append(&self, entry: &AuditEntry) -> IsmsResult<()> {
        let mut chains = self.lock()?;
        let chain = chains.entry(entry.tenant_id.clone()).or_default();

        let head = chain
            .last()
            .map(|e| e.integrity_hash.as_str())
            .unwrap_or(GENESIS_HASH);

        if entry.previous_hash != head {
            return Err(IsmsError::ChainConflict {
                tenant_id: entry.tenant_id.clone(),
                expected: entry.previous_hash.clone(),
                actual: head.to_string(),
            });
        }

        chain.push(entry.clone());
        debug!(
            tenant_id = %entry.tenant_id,
            entry_id = %entry.id,
            position = chain.len() - 1,
            "audit entry appended"
        );
        Ok(())
    }

    fn fetch_last_hash(&self, tenant_id: &str) -> IsmsResult<String> {
        let chains = self.lock()?;
        Ok(chains
            .get(tenant_id)
            .and_then(|chain| chain.last())
            .map(|e| e.integrity_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    fn fetch_range(
        &self,
        tenant_id: &str,
        start: usize,
        end: usize,
    ) -> IsmsResult<Vec<AuditEntry>> {
        let chains = self.lock()?;
        let Some(chain) = chains.get(tenant_id) else {
            return Ok(Vec::new());
        };
        let end = end.min(chain.len());
        let start = start.min(end);
        Ok(chain[start..end].to_vec())
    }

    fn chain_len(&self, tenant_id: &str) -> IsmsResult<usize> {
        let chains = self.lock()?;
        Ok(chains.get(tenant_id).map_or(0, Vec::len))
    }

    fn query(&self, query: &AuditQuery) -> IsmsResult<Vec<AuditEntry>> {
        let chains = self.lock()?;
        let Some(chain) = chains.get(&query.tenant_id) else {
            return Ok(Vec::new());
        };
        let matching = chain.iter().filter(|e| query.matches(e)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }
}
