//! `AuditTrail`: the write and verification front end of the ledger.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::{AuditEntry, AuditQuery, IntegrityReport, SecurityEvent, GENESIS_HASH},
};
use isms_core::{
    cancel::CancellationToken,
    retry::{retry_read, RetryPolicy},
    traits::{AlertSink, AuditStore, SecurityEventSink},
};
use isms_policy::AuditPolicy;

use crate::alert::TracingAlertSink;
use crate::chain::{hash_entry, ChainVerifier};
use crate::event::{build_alert, is_critical, score_event, validate_event};

/// Records security events into per-tenant hash chains and verifies them.
///
/// Appends for one tenant are serialized by an in-process lock. The store's
/// compare-and-swap on the chain head catches writers this lock cannot see
/// (other trails, other processes); on `ChainConflict` the trail re-reads
/// the head and retries up to `AuditPolicy::chain_conflict_retries` times.
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
    policy: AuditPolicy,
    alert_sink: Arc<dyn AlertSink>,
    read_retry: RetryPolicy,
    tenant_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuditTrail {
    /// Create a trail over `store`. Alerts go to `TracingAlertSink` until
    /// another sink is attached.
    pub fn new(store: Arc<dyn AuditStore>, policy: AuditPolicy) -> Self {
        Self {
            store,
            policy,
            alert_sink: Arc::new(TracingAlertSink),
            read_retry: RetryPolicy::default(),
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = sink;
        self
    }

    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Record `event` and return the new entry's id.
    pub fn log_event(&self, event: SecurityEvent) -> IsmsResult<Uuid> {
        self.log_event_entry(event).map(|entry| entry.id)
    }

    /// Record `event` and return the entry exactly as stored.
    ///
    /// # Errors
    ///
    /// - `Validation` if a required field is empty; nothing is hashed.
    /// - `AuditWriteFailed` if the store cannot persist the entry, including
    ///   when chain conflicts outlast the retry budget.
    ///
    /// A failing alert sink is logged and does not fail the call.
    pub fn log_event_entry(&self, event: SecurityEvent) -> IsmsResult<AuditEntry> {
        validate_event(&event)?;

        let timestamp = event.occurred_at.unwrap_or_else(Utc::now);
        let compliance_flags = self
            .policy
            .compliance_flags(&event.action, &event.resource_type);
        let risk_score = score_event(&self.policy, &event, timestamp);

        let mut entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp,
            event_type: event.event_type,
            user_id: event.user_id,
            tenant_id: event.tenant_id,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            action: event.action,
            details: event.details,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            session_id: event.session_id,
            compliance_flags,
            risk_score,
            integrity_hash: String::new(),
            previous_hash: String::new(),
        };

        let lock = self.tenant_lock(&entry.tenant_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let retries = self.policy.chain_conflict_retries;
        let mut attempt = 0;
        loop {
            entry.previous_hash = retry_read(&self.read_retry, "fetch_last_hash", || {
                self.store.fetch_last_hash(&entry.tenant_id)
            })
            .map_err(|e| IsmsError::AuditWriteFailed {
                reason: format!("could not read chain head: {}", e),
            })?;
            entry.integrity_hash = hash_entry(&entry)?;

            match self.store.append(&entry) {
                Ok(()) => break,
                Err(IsmsError::ChainConflict {
                    tenant_id,
                    expected,
                    actual,
                }) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        tenant_id = %tenant_id,
                        expected = %expected,
                        actual = %actual,
                        attempt,
                        "chain head moved during append, retrying"
                    );
                }
                Err(e) => {
                    return Err(IsmsError::AuditWriteFailed {
                        reason: e.to_string(),
                    })
                }
            }
        }

        debug!(
            tenant_id = %entry.tenant_id,
            entry_id = %entry.id,
            event_type = %entry.event_type,
            risk_score = entry.risk_score,
            flags = ?entry.compliance_flags,
            "security event logged"
        );

        if is_critical(
            &self.policy,
            &entry.event_type,
            &entry.compliance_flags,
            entry.risk_score,
        ) {
            let alert = build_alert(&self.policy, &entry);
            if let Err(e) = self.alert_sink.send_alert(&alert) {
                warn!(
                    tenant_id = %entry.tenant_id,
                    entry_id = %entry.id,
                    error = %e,
                    "alert delivery failed"
                );
            }
        }

        Ok(entry)
    }

    /// Verify positions `range` of the tenant chain in one pass.
    ///
    /// `range.end` past the chain length is clamped.
    pub fn verify_chain(&self, tenant_id: &str, range: Range<usize>) -> IsmsResult<IntegrityReport> {
        let page_size = range.len().max(1);
        self.verify_chain_paged(tenant_id, range, page_size, &CancellationToken::new())
    }

    /// Verify the whole tenant chain from genesis.
    pub fn verify_full_chain(&self, tenant_id: &str) -> IsmsResult<IntegrityReport> {
        let len = retry_read(&self.read_retry, "chain_len", || {
            self.store.chain_len(tenant_id)
        })?;
        self.verify_chain(tenant_id, 0..len)
    }

    /// Verify positions `range` fetching `page_size` entries at a time.
    ///
    /// `cancel` is checked before each page. A cancelled scan returns the
    /// breaches found so far with `complete = false`.
    pub fn verify_chain_paged(
        &self,
        tenant_id: &str,
        range: Range<usize>,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> IsmsResult<IntegrityReport> {
        if page_size == 0 {
            return Err(IsmsError::Validation {
                reason: "page_size must be at least 1".to_string(),
            });
        }

        let len = retry_read(&self.read_retry, "chain_len", || {
            self.store.chain_len(tenant_id)
        })?;
        let end = range.end.min(len);
        let start = range.start.min(end);

        let expected_prev = if start == 0 {
            GENESIS_HASH.to_string()
        } else {
            self.fetch_page(tenant_id, start - 1, start)?
                .pop()
                .map(|e| e.integrity_hash)
                .ok_or_else(|| IsmsError::NotFound {
                    kind: "audit entry".to_string(),
                    id: format!("{}#{}", tenant_id, start - 1),
                })?
        };

        let mut verifier = ChainVerifier::new(start, expected_prev);
        let mut position = start;
        let mut complete = true;

        while position < end {
            if cancel.is_cancelled() {
                complete = false;
                break;
            }
            let page_end = position.saturating_add(page_size).min(end);
            let page = self.fetch_page(tenant_id, position, page_end)?;
            if page.is_empty() {
                return Err(IsmsError::Integrity {
                    reason: format!(
                        "chain '{}' returned no entries at position {} of {}",
                        tenant_id, position, end
                    ),
                });
            }
            for entry in &page {
                verifier.check(entry)?;
            }
            position += page.len();
        }

        let (entries_checked, breaches) = verifier.finish();
        if breaches.is_empty() {
            info!(
                tenant_id = %tenant_id,
                range_start = start,
                range_end = end,
                entries_checked,
                complete,
                "audit chain verified"
            );
        } else {
            warn!(
                tenant_id = %tenant_id,
                range_start = start,
                range_end = end,
                entries_checked,
                breaches = breaches.len(),
                complete,
                "audit chain integrity breaches detected"
            );
        }

        Ok(IntegrityReport {
            tenant_id: tenant_id.to_string(),
            range_start: start,
            range_end: end,
            entries_checked,
            breaches,
            complete,
            verified_at: Utc::now(),
        })
    }

    /// Entries matching `query`, in chain order.
    pub fn query(&self, query: &AuditQuery) -> IsmsResult<Vec<AuditEntry>> {
        retry_read(&self.read_retry, "query", || self.store.query(query))
    }

    fn fetch_page(&self, tenant_id: &str, start: usize, end: usize) -> IsmsResult<Vec<AuditEntry>> {
        retry_read(&self.read_retry, "fetch_range", || {
            self.store.fetch_range(tenant_id, start, end)
        })
    }

    fn tenant_lock(&self, tenant_id: &str) -> IsmsResult<Arc<Mutex<()>>> {
        let mut locks = self.tenant_locks.lock().map_err(|e| IsmsError::AuditWriteFailed {
            reason: format!("tenant lock table poisoned: {}", e),
        })?;
        Ok(Arc::clone(locks.entry(tenant_id.to_string()).or_default()))
    }
}

impl SecurityEventSink for AuditTrail {
    fn record(&self, event: SecurityEvent) -> IsmsResult<Uuid> {
        self.log_event(event)
    }
}
