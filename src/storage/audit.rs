// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Authentication outcomes and every publish cycle transition are appended
//! to a daily JSONL file. A failed audit write is logged and otherwise
//! ignored; it never fails the operation being audited.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoragePaths;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auth events
    AuthSuccess,
    AuthFailure,
    IdentityCreated,

    // Publish cycle events
    PublishStarted,
    AdmissionDenied,
    ContentStaged,
    PaymentPending,
    PaymentRejected,
    PaymentConfirmed,
    ContentFinalized,
    ContentReclaimed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Account that triggered the event (if known).
    pub account_id: Option<String>,
    /// Publish cycle correlation id.
    pub cycle_id: Option<String>,
    /// Content address affected.
    pub content_address: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            account_id: None,
            cycle_id: None,
            content_address: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the account ID.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set the cycle correlation id.
    pub fn with_cycle(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle_id = Some(cycle_id.into());
        self
    }

    /// Set the content address.
    pub fn with_address(mut self, address: impl ToString) -> Self {
        self.content_address = Some(address.to_string());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Append-only JSONL audit log.
pub struct AuditLog {
    paths: StoragePaths,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Create an audit log under `paths.audit_dir()`.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an event to its day's log file.
    pub fn log(&self, event: &AuditEvent) -> io::Result<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.paths.audit_events_file(&date);

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Append an event, logging instead of returning any failure.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> io::Result<Vec<AuditEvent>> {
        let path = self.paths.audit_events_file(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(io::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditLog) {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(StoragePaths::new(temp.path()));
        (temp, log)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::ContentStaged)
            .with_account("acct_123")
            .with_cycle("cycle-1")
            .with_address("QmAddress");

        assert_eq!(event.event_type, AuditEventType::ContentStaged);
        assert_eq!(event.account_id.as_deref(), Some("acct_123"));
        assert_eq!(event.cycle_id.as_deref(), Some("cycle-1"));
        assert_eq!(event.content_address.as_deref(), Some("QmAddress"));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::AuthFailure).failed("bad credentials");

        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("bad credentials"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, log) = setup();

        log.log(&AuditEvent::new(AuditEventType::PublishStarted).with_account("a1"))
            .unwrap();
        log.record(AuditEvent::new(AuditEventType::ContentFinalized).with_account("a1"));

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = log.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::PublishStarted);
        assert_eq!(events[1].event_type, AuditEventType::ContentFinalized);
    }

    #[test]
    fn missing_day_reads_empty() {
        let (_temp, log) = setup();
        assert!(log.read_events("2000-01-01").unwrap().is_empty());
    }

    #[test]
    fn record_swallows_write_failures() {
        let temp = TempDir::new().unwrap();
        // A file where the audit directory should be makes every write fail.
        fs::write(temp.path().join("audit"), b"").unwrap();
        let log = AuditLog::new(StoragePaths::new(temp.path()));

        log.record(AuditEvent::new(AuditEventType::AuthSuccess));
        assert!(log.log(&AuditEvent::new(AuditEventType::AuthSuccess)).is_err());
    }
}
