//! # isms-core
//!
//! The collaborator seams of the ISMS compliance engine.
//!
//! This crate provides:
//! - The collaborator traits (`AuditStore`, `AlertSink`, `SecurityEventSink`,
//!   `AssetRegistry`, `AssessmentStore`, `MasterSecretProvider`)
//! - `retry_read`, the backoff loop used on every read path
//! - `CancellationToken` for incremental scans
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isms_core::{traits::AuditStore, retry::{retry_read, RetryPolicy}};
//!
//! let head = retry_read(&RetryPolicy::default(), "fetch_range", || store.fetch_range("acme", 0, 100))?;
//! ```

pub mod cancel;
pub mod retry;
pub mod traits;

pub use cancel::CancellationToken;
pub use retry::{retry_read, RetryPolicy};
