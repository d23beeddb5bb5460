//! # Auto-Book Scheduler
//!
//! Periodic sweep over pending tasks inside the booking lead window.
//! Each eligible task is handed to the booking engine; a failure on one
//! task never aborts the sweep. Hosts without a persisted automation
//! config get the default policy, evaluated in memory and never written
//! back.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::booking_engine::BookingEngine;
use super::types::{BookingAttemptResult, SweepSummary, TaskError};
use crate::error::{EngineError, Result};
use crate::models::{AutomationConfig, Property, Task};
use crate::repository::{
    ConfigRepository, NotificationSink, PaymentLedger, PropertyRepository, TaskRepository,
};
use crate::state_machine::{apply_event, TaskEvent};

pub struct AutoBookScheduler {
    engine: Arc<BookingEngine>,
    tasks: Arc<dyn TaskRepository>,
    properties: Arc<dyn PropertyRepository>,
    configs: Arc<dyn ConfigRepository>,
    payments: Arc<dyn PaymentLedger>,
    notifications: Arc<dyn NotificationSink>,
    /// How far ahead of the scheduled time a task becomes bookable.
    lead_days: i64,
}

impl AutoBookScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<BookingEngine>,
        tasks: Arc<dyn TaskRepository>,
        properties: Arc<dyn PropertyRepository>,
        configs: Arc<dyn ConfigRepository>,
        payments: Arc<dyn PaymentLedger>,
        notifications: Arc<dyn NotificationSink>,
        lead_days: i64,
    ) -> Self {
        Self {
            engine,
            tasks,
            properties,
            configs,
            payments,
            notifications,
            lead_days,
        }
    }

    /// Run sweeps on an interval until `shutdown` flips to true.
    pub async fn run(&self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs = interval.as_secs(), "Auto-book scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(summary) => info!(
                            tasks_processed = summary.tasks_processed,
                            bookings_created = summary.bookings_created,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "Auto-book sweep finished"
                        ),
                        Err(err) => error!(error = %err, "Auto-book sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Auto-book scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One pass over every unbooked pending task inside the lead window.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let cutoff = Utc::now() + Duration::days(self.lead_days);
        let pending = self.tasks.find_pending_before(cutoff).await?;

        let mut summary = SweepSummary::default();
        for task in pending {
            summary.tasks_processed += 1;

            match self.process_task(&task).await {
                Ok(SweepAction::Booked) => summary.bookings_created += 1,
                Ok(SweepAction::Skipped(reason)) => {
                    info!(task_id = %task.id, reason = %reason, "Task skipped");
                    summary.skipped += 1;
                }
                Ok(SweepAction::BookingFailed(error)) => {
                    summary.failed += 1;
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        error,
                    });
                }
                Err(err) => {
                    // Collaborator failure on one task must not poison
                    // the rest of the sweep.
                    error!(task_id = %task.id, error = %err, "Sweep task errored");
                    summary.failed += 1;
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Book one task immediately, bypassing the host's auto-book enable
    /// flags. Used by the manual "book now" action.
    pub async fn book_task_now(&self, task_id: Uuid) -> Result<BookingAttemptResult> {
        let task = self
            .tasks
            .find(task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Task {task_id}")))?;

        if task.has_active_booking() {
            return Err(EngineError::BookingFailed(
                "Task already has an active booking".to_string(),
            ));
        }
        if task.state != crate::state_machine::TaskState::Pending {
            return Err(EngineError::BookingFailed(format!(
                "Task in state {} cannot be booked",
                task.state
            )));
        }

        let (property, config) = self.load_context(&task).await?;
        let result = self.engine.book_task(&task, &property, &config).await;

        if result.success {
            self.commit_booking(task, &result).await?;
        }
        Ok(result)
    }

    async fn process_task(&self, task: &Task) -> Result<SweepAction> {
        let (property, config) = self.load_context(task).await?;

        if !config.auto_book_enabled(task.task_type) {
            return Ok(SweepAction::Skipped(format!(
                "auto-book disabled for {}",
                task.task_type
            )));
        }

        let result = self.engine.book_task(task, &property, &config).await;
        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "unknown booking failure".to_string());
            warn!(task_id = %task.id, error = %error, "Auto-book failed");
            return Ok(SweepAction::BookingFailed(error));
        }

        self.commit_booking(task.clone(), &result).await?;
        Ok(SweepAction::Booked)
    }

    async fn load_context(&self, task: &Task) -> Result<(Property, AutomationConfig)> {
        let property = self
            .properties
            .find(task.property_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Property {}", task.property_id)))?;

        let config = match self.configs.find_by_host(property.host_id).await? {
            Some(config) => config,
            None => AutomationConfig::default_for_host(property.host_id),
        };

        Ok((property, config))
    }

    /// Project a successful booking onto the task and fan out the side
    /// effects: state transition, persistence, payment record, host
    /// notification.
    async fn commit_booking(&self, mut task: Task, result: &BookingAttemptResult) -> Result<()> {
        task.marketplace_booking_id = result.booking_id.clone();
        task.assigned_worker = result.worker.clone();
        apply_event(&mut task, &TaskEvent::Book)?;
        self.tasks.save(&task).await?;

        if let Some(booking_id) = &result.booking_id {
            self.payments
                .create_pending(task.id, booking_id, result.total_cost)
                .await?;
        }

        let worker_name = result
            .worker
            .as_ref()
            .map(|w| w.name.as_str())
            .unwrap_or("worker");
        self.notifications
            .notify_booking_confirmed(&task, worker_name)
            .await;

        info!(
            task_id = %task.id,
            booking_id = result.booking_id.as_deref(),
            worker = worker_name,
            "Booking committed"
        );
        Ok(())
    }
}

enum SweepAction {
    Booked,
    Skipped(String),
    BookingFailed(String),
}
