//! Master secret holder.
//!
//! The master secret never appears in logs: `Debug` is redacted and the
//! bytes are zeroized when the last handle is dropped.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{IsmsError, IsmsResult};

/// Minimum accepted master secret length in bytes.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Length of the master-secret prefix used as the KDF salt.
pub const MASTER_SALT_LEN: usize = 16;

/// A versioned master secret supplied by the secret-management collaborator.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    #[zeroize(skip)]
    version: u32,
    bytes: Vec<u8>,
}

impl MasterSecret {
    /// Wrap `bytes` as master secret `version`.
    ///
    /// Rejects secrets shorter than `MIN_MASTER_SECRET_LEN`. The input
    /// vector is moved in, so no unzeroized copy is left behind.
    pub fn new(version: u32, bytes: Vec<u8>) -> IsmsResult<Self> {
        if bytes.len() < MIN_MASTER_SECRET_LEN {
            let len = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(IsmsError::ConfigError {
                reason: format!(
                    "master secret must be at least {MIN_MASTER_SECRET_LEN} bytes, got {len}"
                ),
            });
        }
        Ok(Self { version, bytes })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// The fixed slice of the secret used as KDF salt.
    pub fn salt(&self) -> &[u8] {
        &self.bytes[..MASTER_SALT_LEN]
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret")
            .field("version", &self.version)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
