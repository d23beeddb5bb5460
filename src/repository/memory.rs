//! In-memory implementations of the collaborator traits.
//!
//! Back the engine in tests and local development; production deployments
//! supply their own persistence-backed implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    AuditLogRepository, ConfigRepository, NotificationSink, PaymentLedger, PropertyRepository,
    RepositoryResult, TaskRepository,
};
use crate::audit::AuditEntry;
use crate::models::{AutomationConfig, Property, Task};
use crate::state_machine::TaskState;

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<Uuid, Task>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Task>> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> RepositoryResult<Option<Task>> {
        Ok(self
            .tasks
            .iter()
            .find(|t| t.marketplace_booking_id.as_deref() == Some(booking_id))
            .map(|t| t.clone()))
    }

    async fn find_pending_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| {
                t.state == TaskState::Pending
                    && t.scheduled_at <= cutoff
                    && t.marketplace_booking_id.is_none()
            })
            .map(|t| t.clone())
            .collect();
        tasks.sort_by_key(|t| t.scheduled_at);
        Ok(tasks)
    }

    async fn find_active_in(&self, states: &[TaskState]) -> RepositoryResult<Vec<Task>> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| states.contains(&t.state) && t.marketplace_booking_id.is_some())
            .map(|t| t.clone())
            .collect())
    }

    async fn save(&self, task: &Task) -> RepositoryResult<()> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPropertyRepository {
    properties: DashMap<Uuid, Property>,
}

impl InMemoryPropertyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, property: Property) {
        self.properties.insert(property.id, property);
    }
}

#[async_trait]
impl PropertyRepository for InMemoryPropertyRepository {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Property>> {
        Ok(self.properties.get(&id).map(|p| p.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryConfigRepository {
    configs: DashMap<Uuid, AutomationConfig>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: AutomationConfig) {
        self.configs.insert(config.host_id, config);
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn find_by_host(&self, host_id: Uuid) -> RepositoryResult<Option<AutomationConfig>> {
        Ok(self.configs.get(&host_id).map(|c| c.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryAuditLogRepository {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, entry: AuditEntry) -> RepositoryResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn entries_for_task(&self, task_id: Uuid) -> RepositoryResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.task_id == Some(task_id))
            .cloned()
            .collect())
    }
}

/// A delivered (recorded) notification, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedNotification {
    StatusChange {
        task_id: Uuid,
        from: TaskState,
        to: TaskState,
        note: Option<String>,
    },
    BookingConfirmed {
        task_id: Uuid,
        worker_name: String,
    },
    UrgentCancellation {
        task_id: Uuid,
        reason: String,
    },
}

/// Notification sink that records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: RwLock<Vec<RecordedNotification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<RecordedNotification> {
        self.sent.read().clone()
    }

    pub fn urgent_count(&self) -> usize {
        self.sent
            .read()
            .iter()
            .filter(|n| matches!(n, RecordedNotification::UrgentCancellation { .. }))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify_status_change(
        &self,
        task: &Task,
        from: TaskState,
        to: TaskState,
        note: Option<&str>,
    ) {
        info!(task_id = %task.id, %from, %to, "Status notification");
        self.sent.write().push(RecordedNotification::StatusChange {
            task_id: task.id,
            from,
            to,
            note: note.map(|n| n.to_string()),
        });
    }

    async fn notify_booking_confirmed(&self, task: &Task, worker_name: &str) {
        info!(task_id = %task.id, worker = %worker_name, "Booking notification");
        self.sent
            .write()
            .push(RecordedNotification::BookingConfirmed {
                task_id: task.id,
                worker_name: worker_name.to_string(),
            });
    }

    async fn notify_urgent_cancellation(&self, task: &Task, reason: &str) {
        info!(task_id = %task.id, reason = %reason, "Urgent cancellation alert");
        self.sent
            .write()
            .push(RecordedNotification::UrgentCancellation {
                task_id: task.id,
                reason: reason.to_string(),
            });
    }
}

/// One ledger record per marketplace booking.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub task_id: Uuid,
    pub booking_id: String,
    pub amount: f64,
    pub paid: bool,
}

/// In-memory payment ledger. Settlement is idempotent per record.
#[derive(Default)]
pub struct InMemoryPaymentLedger {
    records: RwLock<Vec<PaymentRecord>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_for_task(&self, task_id: Uuid) -> Vec<PaymentRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn settled_count(&self) -> usize {
        self.records.read().iter().filter(|r| r.paid).count()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn create_pending(
        &self,
        task_id: Uuid,
        booking_id: &str,
        amount: f64,
    ) -> RepositoryResult<()> {
        self.records.write().push(PaymentRecord {
            task_id,
            booking_id: booking_id.to_string(),
            amount,
            paid: false,
        });
        Ok(())
    }

    async fn settle_for_task(&self, task_id: Uuid) -> RepositoryResult<()> {
        for record in self.records.write().iter_mut() {
            if record.task_id == task_id {
                record.paid = true;
            }
        }
        Ok(())
    }
}
