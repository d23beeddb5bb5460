use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AssignedWorker;

/// Result of one `book_task` invocation. Transient: projected onto the
/// task and the audit log, never stored directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAttemptResult {
    pub success: bool,
    pub booking_id: Option<String>,
    pub worker: Option<AssignedWorker>,
    pub total_cost: f64,
    pub error: Option<String>,
}

impl BookingAttemptResult {
    pub fn booked(booking_id: String, worker: AssignedWorker, total_cost: f64) -> Self {
        Self {
            success: true,
            booking_id: Some(booking_id),
            worker: Some(worker),
            total_cost,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            booking_id: None,
            worker: None,
            total_cost: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Summary of one auto-book sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub tasks_processed: u32,
    pub bookings_created: u32,
    pub skipped: u32,
    pub failed: u32,
    pub errors: Vec<TaskError>,
}

/// Summary of one status-poll sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollSummary {
    pub bookings_checked: u32,
    pub status_changes: u32,
    pub completions: u32,
    pub cancellations: u32,
    pub errors: Vec<TaskError>,
}

/// A per-task failure collected by a sweep instead of aborting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub task_id: Uuid,
    pub error: String,
}

/// Which ingestion path observed a marketplace status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    Webhook,
    Poll,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poll => "poll",
        }
    }
}

/// Acknowledgment returned to the webhook transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookAck {
    Processed { event: String, task_id: Uuid },
    Ignored { reason: String },
}

/// Outcome of a cancellation-triggered replacement search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementOutcome {
    pub replacement_found: bool,
    pub new_booking_id: Option<String>,
    pub new_worker_name: Option<String>,
    pub error: Option<String>,
}
