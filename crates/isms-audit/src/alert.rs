//! Alert sinks shipped with the audit trail.
//!
//! `TracingAlertSink` is the default: it writes the alert as a structured
//! `error!` event so it reaches whatever subscriber the host installed.
//! `MemoryAlertSink` keeps alerts for inspection.

use std::sync::Mutex;

use tracing::error;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::SecurityAlert,
};
use isms_core::traits::AlertSink;

/// Emits each alert through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn send_alert(&self, alert: &SecurityAlert) -> IsmsResult<()> {
        error!(
            severity = %alert.severity,
            tenant_id = %alert.tenant_id,
            entry_id = %alert.entry_id,
            event_type = %alert.event_type,
            risk_score = alert.risk_score,
            escalation = ?alert.escalation,
            "{}",
            alert.description
        );
        Ok(())
    }
}

/// Collects alerts in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every alert received so far.
    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for MemoryAlertSink {
    fn send_alert(&self, alert: &SecurityAlert) -> IsmsResult<()> {
        self.alerts
            .lock()
            .map_err(|e| IsmsError::Collaborator {
                reason: format!("alert buffer lock poisoned: {}", e),
                retryable: false,
            })?
            .push(alert.clone());
        Ok(())
    }
}
