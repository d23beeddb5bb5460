//! Append-only audit trail of every orchestration decision.
//!
//! Entries are written alongside each state-changing operation so the
//! audit history never diverges from a task's actual history, and fanned
//! out on a broadcast channel for live observers.

pub mod logger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub use logger::AuditLog;

/// Kinds of orchestration events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    SearchInitiated,
    SearchCompleted,
    BookingAttempted,
    BookingCreated,
    BookingConfirmed,
    BookingFailed,
    BookingCancelled,
    CancellationReceived,
    ReplacementSearch,
    ReplacementFound,
    ReplacementFailed,
    StatusUpdated,
    TaskStarted,
    TaskCompleted,
    FallbackTriggered,
    RetryInitiated,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SearchInitiated => "search_initiated",
            Self::SearchCompleted => "search_completed",
            Self::BookingAttempted => "booking_attempted",
            Self::BookingCreated => "booking_created",
            Self::BookingConfirmed => "booking_confirmed",
            Self::BookingFailed => "booking_failed",
            Self::BookingCancelled => "booking_cancelled",
            Self::CancellationReceived => "cancellation_received",
            Self::ReplacementSearch => "replacement_search",
            Self::ReplacementFound => "replacement_found",
            Self::ReplacementFailed => "replacement_failed",
            Self::StatusUpdated => "status_updated",
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::FallbackTriggered => "fallback_triggered",
            Self::RetryInitiated => "retry_initiated",
        };
        write!(f, "{name}")
    }
}

/// One immutable audit record. Never mutated or deleted once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub event: AuditEvent,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub host_id: Option<Uuid>,
    pub marketplace_booking_id: Option<String>,
    pub worker_id: Option<String>,
    /// Structured detail payload, event-specific.
    pub details: Option<Value>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub duration_ms: Option<u64>,
    /// Which ingestion path or component produced the entry.
    pub source: Option<String>,
    pub attempt_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(event: AuditEvent, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            message: message.into(),
            task_id: None,
            property_id: None,
            host_id: None,
            marketplace_booking_id: None,
            worker_id: None,
            details: None,
            success: None,
            error_message: None,
            duration_ms: None,
            source: None,
            attempt_number: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_property(mut self, property_id: Uuid) -> Self {
        self.property_id = Some(property_id);
        self
    }

    pub fn with_host(mut self, host_id: Uuid) -> Self {
        self.host_id = Some(host_id);
        self
    }

    pub fn with_booking(mut self, booking_id: impl Into<String>) -> Self {
        self.marketplace_booking_id = Some(booking_id.into());
        self
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self.success = Some(false);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt_number = Some(attempt);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fields() {
        let task_id = Uuid::new_v4();
        let entry = AuditEntry::new(AuditEvent::BookingAttempted, "attempt 2")
            .with_task(task_id)
            .with_booking("bk_42")
            .with_attempt(2)
            .with_success(true);

        assert_eq!(entry.event, AuditEvent::BookingAttempted);
        assert_eq!(entry.task_id, Some(task_id));
        assert_eq!(entry.marketplace_booking_id.as_deref(), Some("bk_42"));
        assert_eq!(entry.attempt_number, Some(2));
        assert_eq!(entry.success, Some(true));
    }

    #[test]
    fn test_with_error_marks_failure() {
        let entry = AuditEntry::new(AuditEvent::BookingFailed, "gave up").with_error("timeout");
        assert_eq!(entry.success, Some(false));
        assert_eq!(entry.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_event_wire_name() {
        assert_eq!(AuditEvent::FallbackTriggered.to_string(), "fallback_triggered");
        let json = serde_json::to_string(&AuditEvent::ReplacementFound).unwrap();
        assert_eq!(json, "\"replacement_found\"");
    }
}
