//! Hash-chain primitives: entry hashing and chain verification.
//!
//! Hash input layout (in order, each field preceded by its byte length as
//! a big-endian u64, so no field boundary can shift):
//!   1. previous_hash (64 ASCII hex chars)
//!   2. id (hyphenated UUID)
//!   3. timestamp (RFC 3339, UTC, `Z` suffix)
//!   4. event_type, user_id, tenant_id, resource_type, resource_id, action
//!   5. canonical JSON of details (object keys sorted at every depth)
//!   6. ip_address, user_agent, session_id (empty when absent)
//!   7. compliance flags, sorted, comma-joined
//!   8. risk_score in decimal
//!
//! Every stored field except `integrity_hash` itself contributes, so
//! altering any of them is detected.

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use isms_contracts::{
    error::IsmsResult,
    event::{AuditEntry, BreachKind, ChainBreach, GENESIS_HASH},
};

/// Compute the integrity hash of `entry`.
///
/// The stored `integrity_hash` is ignored; everything else, including
/// `previous_hash`, is committed to. Returns a lowercase 64-character hex
/// string.
pub fn hash_entry(entry: &AuditEntry) -> IsmsResult<String> {
    let details = canonical_json(&Value::Object(
        entry
            .details
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    ))?;
    let id = entry.id.to_string();
    let timestamp = entry.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
    let flags = entry
        .compliance_flags
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let risk_score = entry.risk_score.to_string();

    let fields: [&[u8]; 15] = [
        entry.previous_hash.as_bytes(),
        id.as_bytes(),
        timestamp.as_bytes(),
        entry.event_type.as_bytes(),
        entry.user_id.as_bytes(),
        entry.tenant_id.as_bytes(),
        entry.resource_type.as_bytes(),
        entry.resource_id.as_bytes(),
        entry.action.as_bytes(),
        &details,
        entry.ip_address.as_deref().unwrap_or("").as_bytes(),
        entry.user_agent.as_deref().unwrap_or("").as_bytes(),
        entry.session_id.as_deref().unwrap_or("").as_bytes(),
        flags.as_bytes(),
        risk_score.as_bytes(),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Serialize `value` with object keys sorted at every depth.
///
/// Objects are rebuilt in key order, so the output does not depend on how
/// `serde_json::Map` orders its entries in this build.
pub fn canonical_json(value: &Value) -> IsmsResult<Vec<u8>> {
    Ok(serde_json::to_vec(&sorted(value))?)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Incremental verifier that can be fed a chain one page at a time.
///
/// Two checks run per entry:
///
/// 1. **Hash correctness**: the recomputed hash equals `integrity_hash`.
/// 2. **Linkage**: `previous_hash` equals the stored hash of the preceding
///    entry. Skipped when the predecessor itself failed check 1, so a single
///    tampered entry is reported once rather than twice.
#[derive(Debug)]
pub struct ChainVerifier {
    position: usize,
    expected_prev: Option<String>,
    checked: usize,
    breaches: Vec<ChainBreach>,
}

impl ChainVerifier {
    /// Start verifying at chain `position`.
    ///
    /// `expected_prev` is the stored hash of the entry before `position`
    /// (`GENESIS_HASH` at position 0).
    pub fn new(position: usize, expected_prev: impl Into<String>) -> Self {
        Self {
            position,
            expected_prev: Some(expected_prev.into()),
            checked: 0,
            breaches: Vec::new(),
        }
    }

    /// Check the next entry in chain order.
    pub fn check(&mut self, entry: &AuditEntry) -> IsmsResult<()> {
        let recomputed = hash_entry(entry)?;
        let hash_ok = recomputed == entry.integrity_hash;

        if !hash_ok {
            self.breaches.push(ChainBreach {
                entry_id: entry.id,
                position: self.position,
                kind: BreachKind::HashMismatch,
                expected_hash: recomputed,
                stored_hash: entry.integrity_hash.clone(),
            });
        }

        if let Some(expected) = &self.expected_prev {
            if &entry.previous_hash != expected {
                self.breaches.push(ChainBreach {
                    entry_id: entry.id,
                    position: self.position,
                    kind: BreachKind::BrokenLink,
                    expected_hash: expected.clone(),
                    stored_hash: entry.previous_hash.clone(),
                });
            }
        }

        self.expected_prev = hash_ok.then(|| entry.integrity_hash.clone());
        self.position += 1;
        self.checked += 1;
        Ok(())
    }

    /// Number of entries checked so far.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Consume the verifier, returning `(entries_checked, breaches)`.
    pub fn finish(self) -> (usize, Vec<ChainBreach>) {
        (self.checked, self.breaches)
    }
}

/// Verify a complete chain that starts at genesis.
///
/// Returns every breach found; an empty vector means the chain is intact.
/// An empty chain is defined as intact.
pub fn verify_chain(entries: &[AuditEntry]) -> IsmsResult<Vec<ChainBreach>> {
    let mut verifier = ChainVerifier::new(0, GENESIS_HASH);
    for entry in entries {
        verifier.check(entry)?;
    }
    Ok(verifier.finish().1)
}
