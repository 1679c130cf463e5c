//! # isms-crypto
//!
//! Classification-driven encryption for the ISMS compliance engine.
//!
//! ## Overview
//!
//! Payloads are sealed with AES-256-GCM under a key derived on demand from
//! the master secret and a deterministic key id. The id encodes the
//! classification, the master secret version, a scope digest and a
//! generation, so decryption needs no key store: the package names its key
//! and the key is re-derived.
//!
//! Decryption is gated by the role × classification access matrix and by
//! tenant. Keys rotate softly: successors take over new writes and older
//! generations stay readable until retired.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use isms_contracts::{classification::Classification, package::{AccessContext, EncryptionContext}};
//! use isms_crypto::{EncryptionService, StaticKeyring};
//! use isms_policy::PolicyConfig;
//!
//! let policy = PolicyConfig::default();
//! let service = EncryptionService::new(Arc::new(StaticKeyring::from_env()?), policy.keys, policy.access)?;
//!
//! let ctx = EncryptionContext::new(Classification::Restricted, "acme", "payroll");
//! let package = service.encrypt(b"salary table", &ctx)?;
//! let plain = service.decrypt(&package, &AccessContext::new("u-1", "admin", "acme"))?;
//! ```

pub mod kdf;
pub mod key_id;
pub mod keyring;
pub mod registry;
pub mod service;

pub use key_id::KeyId;
pub use keyring::StaticKeyring;
pub use service::{payload_hash, EncryptionService};

// ── Tests ─────────────────────────────────────────────────────────────────────
