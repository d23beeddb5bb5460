//! # Status Reconciler
//!
//! Folds marketplace-reported booking statuses back into task lifecycle
//! state. Two ingestion paths feed it: webhook pushes (primary) and the
//! periodic status poll (safety net for missed webhooks). Both normalize
//! to a [`BookingUpdate`] and run through the same application logic, so
//! duplicate observations of one status change converge on the same
//! outcome.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cancellation::CancellationHandler;
use super::types::{PollSummary, ReplacementOutcome, StatusSource, TaskError};
use crate::audit::AuditLog;
use crate::error::Result;
use crate::marketplace::{BookingSnapshot, BookingStatus, MarketplaceClient, MarketplaceError};
use crate::repository::{NotificationSink, PaymentLedger, TaskRepository};
use crate::state_machine::{apply_event, StateMachineError, TaskEvent, TaskState};

/// A marketplace status observation, source-agnostic.
#[derive(Debug, Clone)]
pub struct BookingUpdate {
    pub status: BookingStatus,
    pub reason: Option<String>,
    pub completion_photos: Vec<String>,
    pub worker_feedback: Option<String>,
}

impl From<&BookingSnapshot> for BookingUpdate {
    fn from(snapshot: &BookingSnapshot) -> Self {
        Self {
            status: snapshot.status,
            reason: snapshot.cancellation_reason.clone(),
            completion_photos: snapshot.completion_photos.clone(),
            worker_feedback: snapshot.worker_feedback.clone(),
        }
    }
}

/// What applying an update did.
#[derive(Debug)]
pub enum ReconcileOutcome {
    Transitioned {
        task_id: Uuid,
        from: TaskState,
        to: TaskState,
    },
    CancellationHandled {
        task_id: Uuid,
        replacement: ReplacementOutcome,
    },
    NoChange {
        task_id: Uuid,
    },
    UnknownBooking,
    StaleUpdate {
        task_id: Uuid,
        reason: String,
    },
}

/// Map a marketplace booking status to the task state it implies.
///
/// `Cancelled` maps to no target state: cancellations are a rollback with
/// side effects, owned by the cancellation handler.
pub fn map_status(status: BookingStatus) -> Option<TaskState> {
    match status {
        BookingStatus::Pending | BookingStatus::Confirmed => Some(TaskState::WorkerBooked),
        BookingStatus::InProgress => Some(TaskState::InProgress),
        BookingStatus::Completed => Some(TaskState::Completed),
        BookingStatus::Failed => Some(TaskState::Failed),
        BookingStatus::Cancelled => None,
    }
}

pub struct StatusReconciler {
    client: Arc<dyn MarketplaceClient>,
    tasks: Arc<dyn TaskRepository>,
    payments: Arc<dyn PaymentLedger>,
    notifications: Arc<dyn NotificationSink>,
    cancellations: Arc<CancellationHandler>,
    audit: AuditLog,
}

impl StatusReconciler {
    pub fn new(
        client: Arc<dyn MarketplaceClient>,
        tasks: Arc<dyn TaskRepository>,
        payments: Arc<dyn PaymentLedger>,
        notifications: Arc<dyn NotificationSink>,
        cancellations: Arc<CancellationHandler>,
        audit: AuditLog,
    ) -> Self {
        Self {
            client,
            tasks,
            payments,
            notifications,
            cancellations,
            audit,
        }
    }

    /// Apply one observed status to the task holding `booking_id`.
    pub async fn apply_update(
        &self,
        booking_id: &str,
        update: BookingUpdate,
        source: StatusSource,
    ) -> Result<ReconcileOutcome> {
        let Some(mut task) = self.tasks.find_by_booking_id(booking_id).await? else {
            warn!(
                booking_id = %booking_id,
                source = source.as_str(),
                "Status update for unknown booking id"
            );
            return Ok(ReconcileOutcome::UnknownBooking);
        };

        if update.status == BookingStatus::Cancelled {
            let reason = update.reason.as_deref().unwrap_or("No reason provided");
            let replacement = self
                .cancellations
                .handle_cancellation(task.id, booking_id, reason, source)
                .await?;
            return Ok(ReconcileOutcome::CancellationHandled {
                task_id: task.id,
                replacement,
            });
        }

        // Every non-cancelled status maps to a target state.
        let target = match map_status(update.status) {
            Some(target) => target,
            None => return Ok(ReconcileOutcome::NoChange { task_id: task.id }),
        };

        if target == task.state {
            // Duplicate observation. `booking.confirmed` still carries the
            // worker-acknowledgment bit worth persisting, once.
            if update.status == BookingStatus::Confirmed {
                if let Some(worker) = task.assigned_worker.as_mut() {
                    if !worker.confirmed {
                        worker.confirmed = true;
                        let worker_id = worker.id.clone();
                        self.tasks.save(&task).await?;
                        self.audit
                            .booking_confirmed(task.id, booking_id, &worker_id, source.as_str())
                            .await;
                    }
                }
            }
            return Ok(ReconcileOutcome::NoChange { task_id: task.id });
        }

        let event = match target {
            TaskState::InProgress => TaskEvent::Start,
            TaskState::Completed => TaskEvent::Complete,
            TaskState::Failed => TaskEvent::Fail(
                update
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Marketplace reported failure".to_string()),
            ),
            // A booked-status report against a task already past booking
            // is out of order; there is no forward event for it.
            TaskState::WorkerBooked | TaskState::Pending => {
                let reason = format!(
                    "out-of-order status {} for task in state {}",
                    update.status, task.state
                );
                warn!(task_id = %task.id, booking_id = %booking_id, %reason, "Ignoring stale update");
                return Ok(ReconcileOutcome::StaleUpdate {
                    task_id: task.id,
                    reason,
                });
            }
        };

        let from = task.state;
        match apply_event(&mut task, &event) {
            Ok(_) => {}
            Err(StateMachineError::InvalidTransition { .. }) => {
                // Late delivery against a task that already moved on.
                let reason = format!("illegal transition {} -> {}", from, target);
                warn!(task_id = %task.id, booking_id = %booking_id, %reason, "Ignoring stale update");
                return Ok(ReconcileOutcome::StaleUpdate {
                    task_id: task.id,
                    reason,
                });
            }
        }

        if target == TaskState::Completed {
            if !update.completion_photos.is_empty() {
                task.completion_photos = update.completion_photos.clone();
            }
            if update.worker_feedback.is_some() {
                task.worker_feedback = update.worker_feedback.clone();
            }
        }

        self.tasks.save(&task).await?;

        if target == TaskState::Completed {
            self.payments.settle_for_task(task.id).await?;
        }

        self.notifications
            .notify_status_change(&task, from, target, update.reason.as_deref())
            .await;
        self.audit
            .status_updated(
                task.id,
                booking_id,
                &from.to_string(),
                &target.to_string(),
                source.as_str(),
            )
            .await;

        info!(
            task_id = %task.id,
            booking_id = %booking_id,
            from = %from,
            to = %target,
            source = source.as_str(),
            "Task state reconciled"
        );

        Ok(ReconcileOutcome::Transitioned {
            task_id: task.id,
            from,
            to: target,
        })
    }

    /// Poll the marketplace for every task holding an active booking and
    /// reconcile any drift. The safety net for missed webhooks.
    pub async fn poll_active(&self) -> Result<PollSummary> {
        let active = self
            .tasks
            .find_active_in(&[TaskState::WorkerBooked, TaskState::InProgress])
            .await?;

        let mut summary = PollSummary::default();
        for task in active {
            let Some(booking_id) = task.marketplace_booking_id.clone() else {
                continue;
            };
            summary.bookings_checked += 1;

            let snapshot = match self.client.booking_status(&booking_id).await {
                Ok(snapshot) => snapshot,
                Err(MarketplaceError::BookingNotFound(_)) => {
                    warn!(task_id = %task.id, booking_id = %booking_id, "Booking vanished from marketplace");
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        error: format!("booking {booking_id} not found"),
                    });
                    continue;
                }
                Err(err) => {
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            match self
                .apply_update(&booking_id, BookingUpdate::from(&snapshot), StatusSource::Poll)
                .await
            {
                Ok(ReconcileOutcome::Transitioned { to, .. }) => {
                    summary.status_changes += 1;
                    if to == TaskState::Completed {
                        summary.completions += 1;
                    }
                }
                Ok(ReconcileOutcome::CancellationHandled { .. }) => {
                    summary.status_changes += 1;
                    summary.cancellations += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    error!(task_id = %task.id, error = %err, "Poll reconciliation errored");
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Run status polls on an interval until `shutdown` flips to true.
    pub async fn run_poll(&self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs = interval.as_secs(), "Status poller started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_active().await {
                        Ok(summary) => info!(
                            bookings_checked = summary.bookings_checked,
                            status_changes = summary.status_changes,
                            completions = summary.completions,
                            cancellations = summary.cancellations,
                            "Status poll finished"
                        ),
                        Err(err) => error!(error = %err, "Status poll failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Status poller shutting down");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEvent;
    use crate::marketplace::MockMarketplaceClient;
    use crate::models::{AssignedWorker, Property, Task, TaskType};
    use crate::orchestration::booking_engine::BookingEngine;
    use crate::repository::memory::{
        InMemoryAuditLogRepository, InMemoryConfigRepository, InMemoryPaymentLedger,
        InMemoryPropertyRepository, InMemoryTaskRepository, RecordedNotification,
        RecordingNotificationSink,
    };
    use crate::repository::AuditLogRepository;
    use chrono::{Duration, Utc};

    struct Fixture {
        reconciler: StatusReconciler,
        client: Arc<MockMarketplaceClient>,
        tasks: Arc<InMemoryTaskRepository>,
        properties: Arc<InMemoryPropertyRepository>,
        payments: Arc<InMemoryPaymentLedger>,
        notifications: Arc<RecordingNotificationSink>,
        audit_repo: Arc<InMemoryAuditLogRepository>,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(MockMarketplaceClient::with_default_roster());
        let audit_repo = Arc::new(InMemoryAuditLogRepository::new());
        let audit = AuditLog::new(audit_repo.clone());
        let engine = Arc::new(
            BookingEngine::new(client.clone(), audit.clone())
                .with_retry_delay(std::time::Duration::from_millis(1)),
        );

        let tasks = Arc::new(InMemoryTaskRepository::new());
        let properties = Arc::new(InMemoryPropertyRepository::new());
        let configs = Arc::new(InMemoryConfigRepository::new());
        let payments = Arc::new(InMemoryPaymentLedger::new());
        let notifications = Arc::new(RecordingNotificationSink::new());

        let cancellations = Arc::new(CancellationHandler::new(
            engine,
            tasks.clone(),
            properties.clone(),
            configs,
            payments.clone(),
            notifications.clone(),
            audit.clone(),
        ));

        let reconciler = StatusReconciler::new(
            client.clone(),
            tasks.clone(),
            payments.clone(),
            notifications.clone(),
            cancellations,
            audit,
        );

        Fixture {
            reconciler,
            client,
            tasks,
            properties,
            payments,
            notifications,
            audit_repo,
        }
    }

    fn booked_task(state: TaskState, booking_id: &str) -> Task {
        let mut task = Task::new(
            TaskType::Cleaning,
            Uuid::new_v4(),
            "Turnover clean",
            100.0,
            Utc::now() + Duration::hours(36),
            2.0,
        );
        task.state = state;
        task.marketplace_booking_id = Some(booking_id.to_string());
        task.assigned_worker = Some(AssignedWorker {
            id: "w_001".to_string(),
            name: "Maria Garcia".to_string(),
            photo_url: None,
            rating: 4.8,
            reviews: 127,
            confirmed: false,
        });
        task
    }

    fn update(status: BookingStatus) -> BookingUpdate {
        BookingUpdate {
            status,
            reason: None,
            completion_photos: Vec::new(),
            worker_feedback: None,
        }
    }

    #[test]
    fn test_status_map() {
        assert_eq!(map_status(BookingStatus::Pending), Some(TaskState::WorkerBooked));
        assert_eq!(map_status(BookingStatus::Confirmed), Some(TaskState::WorkerBooked));
        assert_eq!(map_status(BookingStatus::InProgress), Some(TaskState::InProgress));
        assert_eq!(map_status(BookingStatus::Completed), Some(TaskState::Completed));
        assert_eq!(map_status(BookingStatus::Failed), Some(TaskState::Failed));
        assert_eq!(map_status(BookingStatus::Cancelled), None);
    }

    #[tokio::test]
    async fn test_unknown_booking_is_ignored() {
        let f = fixture();
        let outcome = f
            .reconciler
            .apply_update("bk_ghost", update(BookingStatus::InProgress), StatusSource::Webhook)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::UnknownBooking));
    }

    #[tokio::test]
    async fn test_start_transition() {
        let f = fixture();
        let task = booked_task(TaskState::WorkerBooked, "bk_1");
        f.tasks.insert(task.clone());

        let outcome = f
            .reconciler
            .apply_update("bk_1", update(BookingStatus::InProgress), StatusSource::Webhook)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Transitioned { to: TaskState::InProgress, .. }
        ));
        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::InProgress);
        assert!(matches!(
            f.notifications.sent()[0],
            RecordedNotification::StatusChange { to: TaskState::InProgress, .. }
        ));

        let entries = f.audit_repo.entries_for_task(task.id).await.unwrap();
        assert_eq!(entries[0].event, AuditEvent::TaskStarted);
    }

    #[tokio::test]
    async fn test_completion_records_artifacts_and_settles_payment() {
        let f = fixture();
        let task = booked_task(TaskState::InProgress, "bk_1");
        f.tasks.insert(task.clone());
        f.payments.create_pending(task.id, "bk_1", 95.0).await.unwrap();

        let completed = BookingUpdate {
            status: BookingStatus::Completed,
            reason: None,
            completion_photos: vec!["https://cdn.example/p1.jpg".to_string()],
            worker_feedback: Some("All done, left keys in lockbox".to_string()),
        };
        f.reconciler
            .apply_update("bk_1", completed, StatusSource::Webhook)
            .await
            .unwrap();

        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::Completed);
        assert!(saved.completed_at.is_some());
        assert_eq!(saved.completion_photos.len(), 1);
        assert!(saved.worker_feedback.is_some());
        assert_eq!(f.payments.settled_count(), 1);

        let entries = f.audit_repo.entries_for_task(task.id).await.unwrap();
        assert_eq!(entries[0].event, AuditEvent::TaskCompleted);
    }

    #[tokio::test]
    async fn test_duplicate_status_is_a_no_op() {
        let f = fixture();
        let task = booked_task(TaskState::InProgress, "bk_1");
        f.tasks.insert(task.clone());

        let outcome = f
            .reconciler
            .apply_update("bk_1", update(BookingStatus::InProgress), StatusSource::Poll)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::NoChange { .. }));
        assert!(f.notifications.sent().is_empty());
        assert!(f.audit_repo.entries_for_task(task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_duplicate_persists_worker_acknowledgment() {
        let f = fixture();
        let task = booked_task(TaskState::WorkerBooked, "bk_1");
        f.tasks.insert(task.clone());

        f.reconciler
            .apply_update("bk_1", update(BookingStatus::Confirmed), StatusSource::Webhook)
            .await
            .unwrap();

        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert!(saved.assigned_worker.unwrap().confirmed);

        let entries = f.audit_repo.entries_for_task(task.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::BookingConfirmed);
        assert_eq!(entries[0].worker_id.as_deref(), Some("w_001"));

        // A replayed confirmation does not append a second entry.
        f.reconciler
            .apply_update("bk_1", update(BookingStatus::Confirmed), StatusSource::Webhook)
            .await
            .unwrap();
        assert_eq!(f.audit_repo.entries_for_task(task.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_booking_reference() {
        let f = fixture();
        let task = booked_task(TaskState::WorkerBooked, "bk_1");
        f.tasks.insert(task.clone());

        let failed = BookingUpdate {
            status: BookingStatus::Failed,
            reason: Some("Worker no-show".to_string()),
            completion_photos: Vec::new(),
            worker_feedback: None,
        };
        f.reconciler
            .apply_update("bk_1", failed, StatusSource::Webhook)
            .await
            .unwrap();

        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::Failed);
        // The last booking id stays on the failed task for traceability.
        assert_eq!(saved.marketplace_booking_id.as_deref(), Some("bk_1"));
    }

    #[tokio::test]
    async fn test_out_of_order_status_is_ignored() {
        let f = fixture();
        let task = booked_task(TaskState::InProgress, "bk_1");
        f.tasks.insert(task.clone());

        let outcome = f
            .reconciler
            .apply_update("bk_1", update(BookingStatus::Confirmed), StatusSource::Poll)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::StaleUpdate { .. }));
        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::InProgress);
    }

    #[tokio::test]
    async fn test_cancelled_status_routes_to_cancellation_handler() {
        let f = fixture();
        let prop = Property {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            name: "Villa".to_string(),
            street: "3 Oak St".to_string(),
            city: "Las Vegas".to_string(),
            state: "NV".to_string(),
            zip_code: "89101".to_string(),
        };
        let mut task = booked_task(TaskState::WorkerBooked, "bk_1");
        task.property_id = prop.id;
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        let cancelled = BookingUpdate {
            status: BookingStatus::Cancelled,
            reason: Some("Worker illness".to_string()),
            completion_photos: Vec::new(),
            worker_feedback: None,
        };
        let outcome = f
            .reconciler
            .apply_update("bk_1", cancelled, StatusSource::Webhook)
            .await
            .unwrap();

        match outcome {
            ReconcileOutcome::CancellationHandled { replacement, .. } => {
                assert!(replacement.replacement_found);
            }
            other => panic!("expected CancellationHandled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_reconciles_drift() {
        let f = fixture();

        // Create a real booking in the mock so the poll can fetch it.
        let booking = f
            .client
            .create_booking(&crate::marketplace::BookingRequest {
                worker_id: "w_001".to_string(),
                task_description: "Turnover clean".to_string(),
                start_time: Utc::now(),
                end_time: Utc::now(),
                budget: 100.0,
                special_requests: None,
            })
            .await
            .unwrap();

        let task = booked_task(TaskState::WorkerBooked, &booking.id);
        f.tasks.insert(task.clone());
        f.client.set_booking_status(&booking.id, BookingStatus::InProgress);

        let summary = f.reconciler.poll_active().await.unwrap();
        assert_eq!(summary.bookings_checked, 1);
        assert_eq!(summary.status_changes, 1);
        assert_eq!(summary.completions, 0);

        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::InProgress);

        // A second poll sees no drift.
        let summary = f.reconciler.poll_active().await.unwrap();
        assert_eq!(summary.status_changes, 0);
    }

    #[tokio::test]
    async fn test_poll_reports_vanished_booking() {
        let f = fixture();
        let task = booked_task(TaskState::WorkerBooked, "bk_gone");
        f.tasks.insert(task.clone());

        let summary = f.reconciler.poll_active().await.unwrap();
        assert_eq!(summary.bookings_checked, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].task_id, task.id);
    }
}
