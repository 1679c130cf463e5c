//! Demo scenarios, one per component.

pub mod audit_trail;
pub mod encryption;
pub mod risk;
