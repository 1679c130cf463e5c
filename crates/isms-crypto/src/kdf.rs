//! Key derivation and the derived-key cache.
//!
//! `key = PBKDF2-HMAC-SHA256(master ‖ key_id, master[0..16], iterations, 32)`
//!
//! Derivation is deterministic, so no key material is ever stored outside
//! process memory. The cache holds one slot per key id; concurrent first
//! requests for the same id block on the slot while a single thread runs
//! the derivation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    secret::MasterSecret,
};
use isms_core::traits::MasterSecretProvider;

use crate::key_id::KeyId;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Derived key material, wiped when the last reference drops.
pub type DerivedKey = Arc<Zeroizing<[u8; KEY_LEN]>>;

type Slot = Arc<OnceLock<DerivedKey>>;

/// Derive the key for `key_id` from `secret`.
pub fn derive_key(secret: &MasterSecret, key_id: &str, iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut password = Zeroizing::new(Vec::with_capacity(secret.expose().len() + key_id.len()));
    password.extend_from_slice(secret.expose());
    password.extend_from_slice(key_id.as_bytes());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(&password, secret.salt(), iterations, &mut key[..]);
    key
}

/// Process-lifetime cache of derived keys, keyed by key id.
pub struct KeyCache {
    iterations: u32,
    slots: RwLock<HashMap<String, Slot>>,
    derivations: AtomicUsize,
}

impl KeyCache {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            slots: RwLock::new(HashMap::new()),
            derivations: AtomicUsize::new(0),
        }
    }

    /// Return the key for `key_id`, deriving it on first use.
    ///
    /// The master secret is fetched by the version embedded in the id, so
    /// keys issued under older secrets keep working.
    pub fn get(&self, key_id: &KeyId, secrets: &dyn MasterSecretProvider) -> IsmsResult<DerivedKey> {
        let id = key_id.to_string();
        let slot = self.slot(&id)?;
        if let Some(key) = slot.get() {
            return Ok(Arc::clone(key));
        }

        let secret = secrets.version(key_id.master_version)?;
        let key = slot.get_or_init(|| {
            self.derivations.fetch_add(1, Ordering::SeqCst);
            debug!(key_id = %id, iterations = self.iterations, "deriving key");
            Arc::new(derive_key(&secret, &id, self.iterations))
        });
        Ok(Arc::clone(key))
    }

    /// Number of derivations performed so far.
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &str) -> IsmsResult<Slot> {
        {
            let slots = self.slots.read().map_err(|_| poisoned())?;
            if let Some(slot) = slots.get(id) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        Ok(Arc::clone(slots.entry(id.to_string()).or_default()))
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("iterations", &self.iterations)
            .field("cached", &self.len())
            .field("derivations", &self.derivations())
            .finish()
    }
}

fn poisoned() -> IsmsError {
    IsmsError::Crypto {
        reason: "key cache lock poisoned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use isms_contracts::{classification::Classification, package::EncryptionContext};

    use super::*;
    use crate::keyring::StaticKeyring;

    fn ring() -> StaticKeyring {
        StaticKeyring::new(MasterSecret::new(1, (0u8..32).collect()).unwrap())
            .with_secret(MasterSecret::new(2, (100u8..132).collect()).unwrap())
            .unwrap()
    }

    fn key_id(version: u32) -> KeyId {
        KeyId::for_context(
            &EncryptionContext::new(Classification::Confidential, "acme", "crm"),
            version,
        )
    }

    #[test]
    fn derivation_is_deterministic_and_id_bound() {
        let secret = MasterSecret::new(1, vec![7; 32]).unwrap();
        let a = derive_key(&secret, "internal-m1-0123456789abcdef-g1", 1_000);
        let b = derive_key(&secret, "internal-m1-0123456789abcdef-g1", 1_000);
        let c = derive_key(&secret, "internal-m1-0123456789abcdef-g2", 1_000);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn master_version_changes_key() {
        let cache = KeyCache::new(1_000);
        let ring = ring();
        let v1 = cache.get(&key_id(1), &ring).unwrap();
        let v2 = cache.get(&key_id(2), &ring).unwrap();
        assert_ne!(**v1, **v2);
    }

    #[test]
    fn cached_after_first_use() {
        let cache = KeyCache::new(1_000);
        let ring = ring();
        let first = cache.get(&key_id(1), &ring).unwrap();
        let second = cache.get(&key_id(1), &ring).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.derivations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_master_version_surfaces() {
        let cache = KeyCache::new(1_000);
        let result = cache.get(&key_id(7), &ring());
        assert!(matches!(result, Err(IsmsError::NotFound { .. })));
        assert_eq!(cache.derivations(), 0);
    }

    /// Concurrent first requests derive once.
    #[test]
    fn single_flight_under_contention() {
        let cache = KeyCache::new(20_000);
        let ring = ring();
        let id = key_id(1);

        let keys: Vec<DerivedKey> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.get(&id, &ring).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.derivations(), 1);
        assert!(keys.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
