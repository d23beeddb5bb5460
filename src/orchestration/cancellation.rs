//! # Cancellation Handler
//!
//! Reacts to worker-side booking cancellations: rolls the task back to
//! pending, alerts the host when the start time is close, and immediately
//! searches for a replacement worker.
//!
//! Processing is serialized per task so a webhook and a concurrent poll
//! reporting the same cancellation cannot both run the replacement
//! search.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::booking_engine::BookingEngine;
use super::types::{ReplacementOutcome, StatusSource};
use crate::audit::AuditLog;
use crate::error::{EngineError, Result};
use crate::models::AutomationConfig;
use crate::repository::{
    ConfigRepository, NotificationSink, PaymentLedger, PropertyRepository, TaskRepository,
};
use crate::state_machine::{apply_event, StateMachineError, TaskEvent, TaskState};

/// Cancellations inside this window trigger an urgent host alert.
const URGENT_WINDOW_HOURS: i64 = 2;

pub struct CancellationHandler {
    engine: Arc<BookingEngine>,
    tasks: Arc<dyn TaskRepository>,
    properties: Arc<dyn PropertyRepository>,
    configs: Arc<dyn ConfigRepository>,
    payments: Arc<dyn PaymentLedger>,
    notifications: Arc<dyn NotificationSink>,
    audit: AuditLog,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CancellationHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<BookingEngine>,
        tasks: Arc<dyn TaskRepository>,
        properties: Arc<dyn PropertyRepository>,
        configs: Arc<dyn ConfigRepository>,
        payments: Arc<dyn PaymentLedger>,
        notifications: Arc<dyn NotificationSink>,
        audit: AuditLog,
    ) -> Self {
        Self {
            engine,
            tasks,
            properties,
            configs,
            payments,
            notifications,
            audit,
            locks: DashMap::new(),
        }
    }

    /// Process a worker cancellation for `booking_id`.
    ///
    /// Idempotent: once a cancellation has been processed the task no
    /// longer carries the booking id, and duplicate deliveries (webhook
    /// retry, webhook racing a poll) become no-ops.
    pub async fn handle_cancellation(
        &self,
        task_id: Uuid,
        booking_id: &str,
        reason: &str,
        source: StatusSource,
    ) -> Result<ReplacementOutcome> {
        let lock = self
            .locks
            .entry(task_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.process_cancellation(task_id, booking_id, reason, source)
                .await
        };

        // Two strong counts mean the table entry and our handle only, so
        // no concurrent caller is waiting and the entry can go.
        self.locks
            .remove_if(&task_id, |_, entry| Arc::strong_count(entry) <= 2);

        result
    }

    async fn process_cancellation(
        &self,
        task_id: Uuid,
        booking_id: &str,
        reason: &str,
        source: StatusSource,
    ) -> Result<ReplacementOutcome> {
        // Re-read under the lock; a racing delivery may have finished.
        let mut task = self
            .tasks
            .find(task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Task {task_id}")))?;

        if task.marketplace_booking_id.as_deref() != Some(booking_id) {
            info!(
                task_id = %task_id,
                booking_id = %booking_id,
                "Cancellation already processed, ignoring duplicate"
            );
            return Ok(ReplacementOutcome {
                replacement_found: false,
                new_booking_id: None,
                new_worker_name: None,
                error: Some("cancellation already processed".to_string()),
            });
        }

        self.audit
            .cancellation_received(task.id, booking_id, reason, source.as_str())
            .await;

        let previous_state = task.state;
        task.marketplace_booking_id = None;
        task.assigned_worker = None;
        match apply_event(&mut task, &TaskEvent::Cancel(reason.to_string())) {
            Ok(_) => {}
            Err(StateMachineError::InvalidTransition { .. }) => {
                // Terminal or never-booked task; the marketplace update is
                // stale and the rollback does not apply.
                warn!(
                    task_id = %task.id,
                    state = %previous_state,
                    "Cancellation for task not in a cancellable state"
                );
                return Ok(ReplacementOutcome {
                    replacement_found: false,
                    new_booking_id: None,
                    new_worker_name: None,
                    error: Some(format!("task in state {previous_state} cannot be cancelled")),
                });
            }
        }
        self.tasks.save(&task).await?;
        self.audit
            .booking_cancelled(task.id, booking_id, source.as_str())
            .await;

        self.notifications
            .notify_status_change(
                &task,
                previous_state,
                TaskState::Pending,
                Some(&format!("Worker cancelled: {reason}")),
            )
            .await;

        if task.scheduled_at - Utc::now() < Duration::hours(URGENT_WINDOW_HOURS) {
            warn!(task_id = %task.id, "Cancellation within the urgent window");
            self.notifications
                .notify_urgent_cancellation(&task, reason)
                .await;
        }

        let outcome = self.search_replacement(&mut task).await?;
        Ok(outcome)
    }

    async fn search_replacement(&self, task: &mut crate::models::Task) -> Result<ReplacementOutcome> {
        let property = self
            .properties
            .find(task.property_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Property {}", task.property_id)))?;
        let config = match self.configs.find_by_host(property.host_id).await? {
            Some(config) => config,
            None => AutomationConfig::default_for_host(property.host_id),
        };

        self.audit.replacement_search(task.id).await;
        let result = self.engine.book_task(task, &property, &config).await;
        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "unknown booking failure".to_string());
            self.audit
                .replacement_result(task.id, None, Some(&error))
                .await;
            return Ok(ReplacementOutcome {
                replacement_found: false,
                new_booking_id: None,
                new_worker_name: None,
                error: Some(error),
            });
        }

        task.marketplace_booking_id = result.booking_id.clone();
        task.assigned_worker = result.worker.clone();
        apply_event(task, &TaskEvent::Book)?;
        self.tasks.save(task).await?;

        if let Some(booking_id) = &result.booking_id {
            self.payments
                .create_pending(task.id, booking_id, result.total_cost)
                .await?;
        }

        let worker_name = result.worker.as_ref().map(|w| w.name.clone());
        if let Some(name) = &worker_name {
            self.notifications.notify_booking_confirmed(task, name).await;
        }

        self.audit
            .replacement_result(task.id, result.booking_id.as_deref(), None)
            .await;

        info!(
            task_id = %task.id,
            new_booking_id = result.booking_id.as_deref(),
            "Replacement worker booked"
        );

        Ok(ReplacementOutcome {
            replacement_found: true,
            new_booking_id: result.booking_id.clone(),
            new_worker_name: worker_name,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEvent;
    use crate::marketplace::MockMarketplaceClient;
    use crate::models::{AssignedWorker, Property, Task, TaskType};
    use crate::repository::memory::{
        InMemoryAuditLogRepository, InMemoryConfigRepository, InMemoryPaymentLedger,
        InMemoryPropertyRepository, InMemoryTaskRepository, RecordingNotificationSink,
    };
    use crate::repository::AuditLogRepository;

    struct Fixture {
        handler: CancellationHandler,
        tasks: Arc<InMemoryTaskRepository>,
        properties: Arc<InMemoryPropertyRepository>,
        audit_repo: Arc<InMemoryAuditLogRepository>,
        notifications: Arc<RecordingNotificationSink>,
        payments: Arc<InMemoryPaymentLedger>,
    }

    fn fixture(client: MockMarketplaceClient) -> Fixture {
        let client = Arc::new(client);
        let audit_repo = Arc::new(InMemoryAuditLogRepository::new());
        let audit = AuditLog::new(audit_repo.clone());
        let engine = Arc::new(
            BookingEngine::new(client, audit.clone())
                .with_retry_delay(std::time::Duration::from_millis(1)),
        );

        let tasks = Arc::new(InMemoryTaskRepository::new());
        let properties = Arc::new(InMemoryPropertyRepository::new());
        let configs = Arc::new(InMemoryConfigRepository::new());
        let payments = Arc::new(InMemoryPaymentLedger::new());
        let notifications = Arc::new(RecordingNotificationSink::new());

        let handler = CancellationHandler::new(
            engine,
            tasks.clone(),
            properties.clone(),
            configs,
            payments.clone(),
            notifications.clone(),
            audit,
        );

        Fixture {
            handler,
            tasks,
            properties,
            audit_repo,
            notifications,
            payments,
        }
    }

    fn booked_task(property: &Property, hours_out: i64, booking_id: &str) -> Task {
        let mut task = Task::new(
            TaskType::Cleaning,
            property.id,
            "Turnover clean",
            100.0,
            Utc::now() + Duration::hours(hours_out),
            2.0,
        );
        task.state = TaskState::WorkerBooked;
        task.marketplace_booking_id = Some(booking_id.to_string());
        task.assigned_worker = Some(AssignedWorker {
            id: "w_old".to_string(),
            name: "Former Worker".to_string(),
            photo_url: None,
            rating: 4.2,
            reviews: 12,
            confirmed: true,
        });
        task
    }

    fn property() -> Property {
        Property {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            name: "Casa Roja".to_string(),
            street: "77 Dune Way".to_string(),
            city: "Las Vegas".to_string(),
            state: "NV".to_string(),
            zip_code: "89102".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cancellation_finds_replacement() {
        let f = fixture(MockMarketplaceClient::with_default_roster());
        let prop = property();
        let task = booked_task(&prop, 36, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        let outcome = f
            .handler
            .handle_cancellation(task.id, "bk_old", "Worker illness", StatusSource::Webhook)
            .await
            .unwrap();

        assert!(outcome.replacement_found);
        let new_id = outcome.new_booking_id.unwrap();
        assert_ne!(new_id, "bk_old");

        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::WorkerBooked);
        assert_eq!(saved.marketplace_booking_id.as_deref(), Some(new_id.as_str()));
        assert_ne!(saved.assigned_worker.unwrap().id, "w_old");

        let entries = f.audit_repo.entries_for_task(task.id).await.unwrap();
        assert!(entries.iter().any(|e| e.event == AuditEvent::CancellationReceived));
        assert!(entries.iter().any(|e| e.event == AuditEvent::BookingCancelled));
        assert!(entries.iter().any(|e| e.event == AuditEvent::ReplacementSearch));
        assert!(entries.iter().any(|e| e.event == AuditEvent::ReplacementFound));

        assert_eq!(f.payments.records_for_task(task.id).len(), 1);
    }

    #[tokio::test]
    async fn test_lock_table_drains_after_processing() {
        let f = fixture(MockMarketplaceClient::with_default_roster());
        let prop = property();
        let task = booked_task(&prop, 36, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        f.handler
            .handle_cancellation(task.id, "bk_old", "Illness", StatusSource::Webhook)
            .await
            .unwrap();

        assert!(f.handler.locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_without_replacement_leaves_task_pending() {
        let f = fixture(MockMarketplaceClient::new()); // empty roster
        let prop = property();
        let task = booked_task(&prop, 36, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        let outcome = f
            .handler
            .handle_cancellation(task.id, "bk_old", "No show", StatusSource::Poll)
            .await
            .unwrap();

        assert!(!outcome.replacement_found);
        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::Pending);
        assert!(saved.marketplace_booking_id.is_none());
        assert!(saved.assigned_worker.is_none());

        let entries = f.audit_repo.entries_for_task(task.id).await.unwrap();
        assert!(entries.iter().any(|e| e.event == AuditEvent::ReplacementFailed));
    }

    #[tokio::test]
    async fn test_urgent_window_triggers_alert() {
        let f = fixture(MockMarketplaceClient::with_default_roster());
        let prop = property();
        let task = booked_task(&prop, 1, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        f.handler
            .handle_cancellation(task.id, "bk_old", "Emergency", StatusSource::Webhook)
            .await
            .unwrap();

        assert_eq!(f.notifications.urgent_count(), 1);
    }

    #[tokio::test]
    async fn test_non_urgent_cancellation_skips_alert() {
        let f = fixture(MockMarketplaceClient::with_default_roster());
        let prop = property();
        let task = booked_task(&prop, 36, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        f.handler
            .handle_cancellation(task.id, "bk_old", "Schedule conflict", StatusSource::Webhook)
            .await
            .unwrap();

        assert_eq!(f.notifications.urgent_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_a_no_op() {
        let f = fixture(MockMarketplaceClient::with_default_roster());
        let prop = property();
        let task = booked_task(&prop, 36, "bk_old");
        f.properties.insert(prop);
        f.tasks.insert(task.clone());

        let first = f
            .handler
            .handle_cancellation(task.id, "bk_old", "Illness", StatusSource::Webhook)
            .await
            .unwrap();
        assert!(first.replacement_found);

        // Second delivery references the replaced booking id.
        let second = f
            .handler
            .handle_cancellation(task.id, "bk_old", "Illness", StatusSource::Poll)
            .await
            .unwrap();
        assert!(!second.replacement_found);
        assert_eq!(
            second.error.as_deref(),
            Some("cancellation already processed")
        );

        // The replacement from the first delivery is still in place.
        let saved = f.tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(saved.state, TaskState::WorkerBooked);
        assert_eq!(f.payments.records_for_task(task.id).len(), 1);
    }
}
