//! Active-key bookkeeping: which generation each lineage writes with, when
//! it was issued, and which identifiers have been retired.
//!
//! Only metadata lives here. Key material is always re-derived from the id.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    package::EncryptionContext,
};

use crate::key_id::KeyId;

/// The generation a lineage currently encrypts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveKey {
    pub id: KeyId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct KeyRegistry {
    active: RwLock<HashMap<String, ActiveKey>>,
    retired: RwLock<BTreeSet<String>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key new payloads for `context` should use, issuing generation 1
    /// on first use. `is_retired` covers retirements made outside the
    /// registry; a retired active key is skipped to its successor.
    pub fn active_for(
        &self,
        context: &EncryptionContext,
        master_version: u32,
        now: DateTime<Utc>,
        is_retired: impl Fn(&str) -> bool,
    ) -> IsmsResult<KeyId> {
        let first = KeyId::for_context(context, master_version);
        let lineage = first.lineage();

        {
            let active = self.active.read().map_err(|_| poisoned())?;
            if let Some(key) = active.get(&lineage) {
                if !self.retired(&key.id, &is_retired)? {
                    return Ok(key.id.clone());
                }
            }
        }

        let mut active = self.active.write().map_err(|_| poisoned())?;
        let key = active.entry(lineage).or_insert(ActiveKey {
            id: first,
            issued_at: now,
        });
        while self.retired(&key.id, &is_retired)? {
            key.id = key.id.successor();
            key.issued_at = now;
        }
        Ok(key.id.clone())
    }

    /// Active keys issued at least `period` before `now`.
    pub fn due_for_rotation(&self, now: DateTime<Utc>, period: Duration) -> IsmsResult<Vec<KeyId>> {
        let active = self.active.read().map_err(|_| poisoned())?;
        let mut due: Vec<KeyId> = active
            .values()
            .filter(|key| now - key.issued_at >= period)
            .map(|key| key.id.clone())
            .collect();
        due.sort_by_key(|id| id.to_string());
        Ok(due)
    }

    /// Replace `previous` with `successor` if `previous` is still the
    /// lineage's active key. Returns false when another caller got there
    /// first.
    pub fn promote(&self, previous: &KeyId, successor: &KeyId, now: DateTime<Utc>) -> IsmsResult<bool> {
        let mut active = self.active.write().map_err(|_| poisoned())?;
        match active.get_mut(&previous.lineage()) {
            Some(key) if key.id == *previous => {
                key.id = successor.clone();
                key.issued_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// When `key_id` became active, or `None` if it is not a lineage's
    /// active key.
    pub fn issued_at(&self, key_id: &KeyId) -> IsmsResult<Option<DateTime<Utc>>> {
        let active = self.active.read().map_err(|_| poisoned())?;
        Ok(active
            .get(&key_id.lineage())
            .filter(|key| key.id == *key_id)
            .map(|key| key.issued_at))
    }

    /// Retire `key_id`. If it is a lineage's active key, the lineage moves
    /// to the next generation. Returns true if it was not already retired.
    pub fn retire(&self, key_id: &KeyId, now: DateTime<Utc>) -> IsmsResult<bool> {
        let newly = self
            .retired
            .write()
            .map_err(|_| poisoned())?
            .insert(key_id.to_string());
        self.promote(key_id, &key_id.successor(), now)?;
        Ok(newly)
    }

    pub fn is_retired(&self, key_id: &str) -> IsmsResult<bool> {
        Ok(self.retired.read().map_err(|_| poisoned())?.contains(key_id))
    }

    /// Snapshot of every lineage's active key, sorted by id.
    pub fn active_keys(&self) -> IsmsResult<Vec<ActiveKey>> {
        let active = self.active.read().map_err(|_| poisoned())?;
        let mut keys: Vec<ActiveKey> = active.values().cloned().collect();
        keys.sort_by_key(|key| key.id.to_string());
        Ok(keys)
    }

    fn retired(&self, id: &KeyId, external: &impl Fn(&str) -> bool) -> IsmsResult<bool> {
        let id = id.to_string();
        Ok(external(&id) || self.is_retired(&id)?)
    }
}

fn poisoned() -> IsmsError {
    IsmsError::Crypto {
        reason: "key registry lock poisoned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use isms_contracts::classification::Classification;

    use super::*;

    fn ctx() -> EncryptionContext {
        EncryptionContext::new(Classification::Internal, "acme", "notes")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn never(_: &str) -> bool {
        false
    }

    #[test]
    fn first_use_issues_generation_one() {
        let registry = KeyRegistry::new();
        let id = registry.active_for(&ctx(), 1, t0(), never).unwrap();
        assert_eq!(id.generation, 1);
        assert_eq!(registry.active_for(&ctx(), 1, t0() + Duration::days(5), never).unwrap(), id);
        assert_eq!(registry.active_keys().unwrap()[0].issued_at, t0());
    }

    #[test]
    fn rotation_due_after_period() {
        let registry = KeyRegistry::new();
        registry.active_for(&ctx(), 1, t0(), never).unwrap();

        let period = Duration::days(90);
        assert!(registry.due_for_rotation(t0() + Duration::days(89), period).unwrap().is_empty());
        assert_eq!(registry.due_for_rotation(t0() + Duration::days(90), period).unwrap().len(), 1);
    }

    #[test]
    fn promote_only_replaces_current() {
        let registry = KeyRegistry::new();
        let g1 = registry.active_for(&ctx(), 1, t0(), never).unwrap();
        let g2 = g1.successor();

        assert!(registry.promote(&g1, &g2, t0()).unwrap());
        assert!(!registry.promote(&g1, &g2.successor(), t0()).unwrap());
        assert_eq!(registry.active_for(&ctx(), 1, t0(), never).unwrap(), g2);
    }

    #[test]
    fn promotion_can_be_undone() {
        let registry = KeyRegistry::new();
        let g1 = registry.active_for(&ctx(), 1, t0(), never).unwrap();
        let g2 = g1.successor();
        let later = t0() + chrono::Duration::days(100);

        assert_eq!(registry.issued_at(&g1).unwrap(), Some(t0()));
        assert!(registry.promote(&g1, &g2, later).unwrap());
        assert_eq!(registry.issued_at(&g1).unwrap(), None);
        assert_eq!(registry.issued_at(&g2).unwrap(), Some(later));

        assert!(registry.promote(&g2, &g1, t0()).unwrap());
        assert_eq!(registry.issued_at(&g1).unwrap(), Some(t0()));
        assert_eq!(registry.active_for(&ctx(), 1, later, never).unwrap(), g1);
    }

    #[test]
    fn retiring_active_key_advances_lineage() {
        let registry = KeyRegistry::new();
        let g1 = registry.active_for(&ctx(), 1, t0(), never).unwrap();

        assert!(registry.retire(&g1, t0()).unwrap());
        assert!(!registry.retire(&g1, t0()).unwrap());
        assert!(registry.is_retired(&g1.to_string()).unwrap());
        assert_eq!(registry.active_for(&ctx(), 1, t0(), never).unwrap().generation, 2);
    }

    #[test]
    fn externally_retired_generations_are_skipped() {
        let registry = KeyRegistry::new();
        let g1 = KeyId::for_context(&ctx(), 1);
        let retired = [g1.to_string(), g1.successor().to_string()];

        let id = registry
            .active_for(&ctx(), 1, t0(), |k| retired.iter().any(|r| r == k))
            .unwrap();
        assert_eq!(id.generation, 3);
    }
}
