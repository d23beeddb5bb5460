use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use super::{AuditEntry, AuditEvent};
use crate::events::EventPublisher;
use crate::repository::AuditLogRepository;

/// Audit log writer: appends to the repository and broadcasts to live
/// subscribers in one call.
///
/// An append failure is logged but never propagated — losing one audit
/// record must not abort the booking or reconciliation that produced it.
#[derive(Clone)]
pub struct AuditLog {
    repository: Arc<dyn AuditLogRepository>,
    publisher: EventPublisher,
}

impl AuditLog {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self {
            repository,
            publisher: EventPublisher::default(),
        }
    }

    pub fn with_publisher(repository: Arc<dyn AuditLogRepository>, publisher: EventPublisher) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Append an entry and broadcast it.
    pub async fn record(&self, entry: AuditEntry) {
        let context = serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null);
        self.publisher.publish(entry.event.to_string(), context);

        if let Err(err) = self.repository.append(entry).await {
            error!(error = %err, "Failed to append audit entry");
        }
    }

    /// Record the start of a worker search.
    pub async fn search_initiated(&self, task_id: Uuid, location: &str, attempt: u32) {
        self.record(
            AuditEntry::new(
                AuditEvent::SearchInitiated,
                format!("Searching for workers in {location}"),
            )
            .with_task(task_id)
            .with_attempt(attempt),
        )
        .await;
    }

    /// Record a search that returned candidates.
    pub async fn search_completed(&self, task_id: Uuid, candidates: usize, attempt: u32) {
        self.record(
            AuditEntry::new(
                AuditEvent::SearchCompleted,
                format!("Found {candidates} candidate workers"),
            )
            .with_task(task_id)
            .with_details(serde_json::json!({ "candidates": candidates }))
            .with_attempt(attempt)
            .with_success(true),
        )
        .await;
    }

    /// Record the backoff before the next booking attempt.
    pub async fn retry_initiated(&self, task_id: Uuid, next_attempt: u32, delay_ms: u64) {
        self.record(
            AuditEntry::new(
                AuditEvent::RetryInitiated,
                format!("Retrying booking, attempt {next_attempt}"),
            )
            .with_task(task_id)
            .with_details(serde_json::json!({ "delay_ms": delay_ms }))
            .with_attempt(next_attempt),
        )
        .await;
    }

    /// Record a booking attempt against a chosen worker.
    pub async fn booking_attempted(&self, task_id: Uuid, worker_id: &str, attempt: u32) {
        self.record(
            AuditEntry::new(
                AuditEvent::BookingAttempted,
                format!("Attempting to book worker {worker_id}"),
            )
            .with_task(task_id)
            .with_worker(worker_id)
            .with_attempt(attempt),
        )
        .await;
    }

    /// Record a successful booking creation.
    pub async fn booking_created(
        &self,
        task_id: Uuid,
        booking_id: &str,
        worker_id: &str,
        total_cost: f64,
        attempt: u32,
    ) {
        self.record(
            AuditEntry::new(
                AuditEvent::BookingCreated,
                format!("Booking {booking_id} created"),
            )
            .with_task(task_id)
            .with_booking(booking_id)
            .with_worker(worker_id)
            .with_details(serde_json::json!({ "total_cost": total_cost }))
            .with_attempt(attempt)
            .with_success(true),
        )
        .await;
    }

    /// Record a fallback search trigger with its relaxed constraints.
    pub async fn fallback_triggered(
        &self,
        task_id: Uuid,
        expanded_budget: f64,
        rating_floor: f64,
        attempt: u32,
    ) {
        self.record(
            AuditEntry::new(
                AuditEvent::FallbackTriggered,
                "No candidates found, expanding search constraints",
            )
            .with_task(task_id)
            .with_details(serde_json::json!({
                "expanded_budget": expanded_budget,
                "rating_floor": rating_floor,
            }))
            .with_attempt(attempt),
        )
        .await;
    }

    /// Record terminal booking failure after retry exhaustion.
    pub async fn booking_failed(&self, task_id: Uuid, error: &str, attempts: u32) {
        self.record(
            AuditEntry::new(AuditEvent::BookingFailed, "Booking failed")
                .with_task(task_id)
                .with_error(error)
                .with_attempt(attempts),
        )
        .await;
    }

    /// Record the worker's confirmation of an existing booking.
    pub async fn booking_confirmed(
        &self,
        task_id: Uuid,
        booking_id: &str,
        worker_id: &str,
        source: &str,
    ) {
        self.record(
            AuditEntry::new(
                AuditEvent::BookingConfirmed,
                format!("Worker confirmed booking {booking_id}"),
            )
            .with_task(task_id)
            .with_booking(booking_id)
            .with_worker(worker_id)
            .with_source(source)
            .with_success(true),
        )
        .await;
    }

    /// Record a received cancellation with its reason and source path.
    pub async fn cancellation_received(
        &self,
        task_id: Uuid,
        booking_id: &str,
        reason: &str,
        source: &str,
    ) {
        warn!(
            task_id = %task_id,
            booking_id = %booking_id,
            reason = %reason,
            source = %source,
            "Worker cancellation received"
        );
        self.record(
            AuditEntry::new(
                AuditEvent::CancellationReceived,
                format!("Booking cancelled: {reason}"),
            )
            .with_task(task_id)
            .with_booking(booking_id)
            .with_source(source),
        )
        .await;
    }

    /// Record the rollback of a cancelled booking.
    pub async fn booking_cancelled(&self, task_id: Uuid, booking_id: &str, source: &str) {
        self.record(
            AuditEntry::new(
                AuditEvent::BookingCancelled,
                format!("Booking {booking_id} cleared, task reset to pending"),
            )
            .with_task(task_id)
            .with_booking(booking_id)
            .with_source(source),
        )
        .await;
    }

    /// Record the start of a replacement search after a cancellation.
    pub async fn replacement_search(&self, task_id: Uuid) {
        self.record(
            AuditEntry::new(
                AuditEvent::ReplacementSearch,
                "Searching for a replacement worker",
            )
            .with_task(task_id),
        )
        .await;
    }

    /// Record the outcome of a replacement search.
    pub async fn replacement_result(
        &self,
        task_id: Uuid,
        new_booking_id: Option<&str>,
        error: Option<&str>,
    ) {
        let entry = match new_booking_id {
            Some(booking_id) => AuditEntry::new(
                AuditEvent::ReplacementFound,
                format!("Replacement booked: {booking_id}"),
            )
            .with_task(task_id)
            .with_booking(booking_id)
            .with_success(true),
            None => AuditEntry::new(AuditEvent::ReplacementFailed, "No replacement found")
                .with_task(task_id)
                .with_error(error.unwrap_or("unknown")),
        };
        self.record(entry).await;
    }

    /// Record a reconciled status change.
    pub async fn status_updated(
        &self,
        task_id: Uuid,
        booking_id: &str,
        from: &str,
        to: &str,
        source: &str,
    ) {
        let event = match to {
            "in_progress" => AuditEvent::TaskStarted,
            "completed" => AuditEvent::TaskCompleted,
            _ => AuditEvent::StatusUpdated,
        };
        self.record(
            AuditEntry::new(event, format!("Status changed: {from} -> {to}"))
                .with_task(task_id)
                .with_booking(booking_id)
                .with_source(source)
                .with_success(true),
        )
        .await;
    }
}
