//! `StaticKeyring`: a fixed set of versioned master secrets.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    secret::MasterSecret,
};
use isms_core::traits::MasterSecretProvider;

/// Environment variable read by `StaticKeyring::from_env`.
pub const MASTER_KEY_ENV: &str = "ISMS_MASTER_KEY";

/// Holds every master secret version the process may need.
///
/// The highest version is current: new keys are issued under it, while
/// older versions stay available so existing payloads remain readable.
#[derive(Debug)]
pub struct StaticKeyring {
    secrets: BTreeMap<u32, Arc<MasterSecret>>,
}

impl StaticKeyring {
    pub fn new(secret: MasterSecret) -> Self {
        let mut secrets = BTreeMap::new();
        secrets.insert(secret.version(), Arc::new(secret));
        Self { secrets }
    }

    /// Add another version. Re-registering a version is a configuration
    /// error.
    pub fn with_secret(mut self, secret: MasterSecret) -> IsmsResult<Self> {
        let version = secret.version();
        if self.secrets.contains_key(&version) {
            return Err(IsmsError::ConfigError {
                reason: format!("master secret version {version} registered twice"),
            });
        }
        self.secrets.insert(version, Arc::new(secret));
        info!(version, "master secret version registered");
        Ok(self)
    }

    /// Build a single-version keyring from a hex-encoded secret.
    pub fn from_hex(version: u32, encoded: &str) -> IsmsResult<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| IsmsError::ConfigError {
            reason: format!("master secret is not valid hex: {e}"),
        })?;
        Ok(Self::new(MasterSecret::new(version, bytes)?))
    }

    /// Build a version-1 keyring from the hex secret in `ISMS_MASTER_KEY`.
    pub fn from_env() -> IsmsResult<Self> {
        let encoded = std::env::var(MASTER_KEY_ENV).map_err(|_| IsmsError::ConfigError {
            reason: format!("{MASTER_KEY_ENV} is not set"),
        })?;
        Self::from_hex(1, &encoded)
    }

    pub fn versions(&self) -> Vec<u32> {
        self.secrets.keys().copied().collect()
    }
}

impl MasterSecretProvider for StaticKeyring {
    fn current(&self) -> IsmsResult<Arc<MasterSecret>> {
        self.secrets
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| IsmsError::ConfigError {
                reason: "keyring holds no master secret".to_string(),
            })
    }

    fn version(&self, version: u32) -> IsmsResult<Arc<MasterSecret>> {
        self.secrets
            .get(&version)
            .cloned()
            .ok_or_else(|| IsmsError::NotFound {
                kind: "master secret version".to_string(),
                id: version.to_string(),
            })
    }
}
