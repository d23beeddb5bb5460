//! Collaborator interfaces consumed by the orchestration engine.
//!
//! Persistence, notification delivery, and payment ledgering are external
//! concerns; the engine depends on these traits only and receives
//! implementations by injection. In-memory implementations live in
//! [`memory`] for tests and local development.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::models::{AutomationConfig, Property, Task};
use crate::state_machine::TaskState;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Property not found: {0}")]
    PropertyNotFound(Uuid),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Task>>;

    /// Lookup by marketplace booking id — the key both reconciliation
    /// paths use, so it must be unambiguous.
    async fn find_by_booking_id(&self, booking_id: &str) -> RepositoryResult<Option<Task>>;

    /// Pending tasks scheduled at or before `cutoff` with no outstanding
    /// marketplace booking, ordered by scheduled time.
    async fn find_pending_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<Vec<Task>>;

    /// Tasks in the given states that hold a marketplace booking id.
    async fn find_active_in(&self, states: &[TaskState]) -> RepositoryResult<Vec<Task>>;

    async fn save(&self, task: &Task) -> RepositoryResult<()>;
}

/// Property lookups.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Property>>;
}

/// Host automation-config lookups. Returns None when the host never
/// configured automation; callers synthesize an in-memory default.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn find_by_host(&self, host_id: Uuid) -> RepositoryResult<Option<AutomationConfig>>;
}

/// Append-only audit log storage.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> RepositoryResult<()>;

    async fn entries_for_task(&self, task_id: Uuid) -> RepositoryResult<Vec<AuditEntry>>;
}

/// Fire-and-forget host notifications. Implementations must not fail the
/// calling operation; delivery errors are their own concern.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A task moved between lifecycle states.
    async fn notify_status_change(
        &self,
        task: &Task,
        from: TaskState,
        to: TaskState,
        note: Option<&str>,
    );

    /// A worker was booked for a task.
    async fn notify_booking_confirmed(&self, task: &Task, worker_name: &str);

    /// A worker cancelled close to the scheduled time.
    async fn notify_urgent_cancellation(&self, task: &Task, reason: &str);
}

/// Payment ledger side effects.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Record a pending payment for a newly created booking.
    async fn create_pending(
        &self,
        task_id: Uuid,
        booking_id: &str,
        amount: f64,
    ) -> RepositoryResult<()>;

    /// Settle all pending records for a completed task.
    async fn settle_for_task(&self, task_id: Uuid) -> RepositoryResult<()>;
}
