//! # isms-audit
//!
//! Immutable, append-only, SHA-256 hash-chained security audit trail.
//!
//! ## Overview
//!
//! Every security event is tagged with compliance flags, given a 0–10 risk
//! score, and appended to its tenant's chain as an `AuditEntry` whose hash
//! commits to every stored field and to the previous entry's hash.
//! Tampering with any field of any entry is detected by `verify_chain`.
//! Critical events additionally raise a `SecurityAlert`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use isms_audit::{AuditTrail, InMemoryAuditStore};
//! use isms_contracts::event::SecurityEvent;
//! use isms_policy::AuditPolicy;
//!
//! let trail = AuditTrail::new(Arc::new(InMemoryAuditStore::new()), AuditPolicy::default());
//! trail.log_event(SecurityEvent::new("data_access", "u-7", "acme", "customer", "c-1", "read"))?;
//!
//! let report = trail.verify_full_chain("acme")?;
//! assert!(report.is_intact());
//! ```

pub mod alert;
pub mod chain;
pub mod event;
pub mod memory;
pub mod trail;

pub use alert::{MemoryAlertSink, TracingAlertSink};
pub use chain::{hash_entry, verify_chain, ChainVerifier};
pub use memory::InMemoryAuditStore;
pub use trail::AuditTrail;

// ── Tests ─────────────────────────────────────────────────────────────────────
