//! # Orchestration
//!
//! The engine proper: booking with retry and fallback, worker selection,
//! the auto-book sweep, status reconciliation from webhooks and polls,
//! and cancellation recovery.

pub mod booking_engine;
pub mod cancellation;
pub mod reconciler;
pub mod scheduler;
pub mod selection;
pub mod types;
pub mod webhook;

pub use booking_engine::BookingEngine;
pub use cancellation::CancellationHandler;
pub use reconciler::{map_status, BookingUpdate, ReconcileOutcome, StatusReconciler};
pub use scheduler::AutoBookScheduler;
pub use selection::{preference_for, select_worker, skill_for_task_type};
pub use types::{
    BookingAttemptResult, PollSummary, ReplacementOutcome, StatusSource, SweepSummary, TaskError,
    WebhookAck,
};
pub use webhook::{sign_payload, WebhookError, WebhookIngress, WebhookPayload};
