//! Central transition logic for the task lifecycle.
//!
//! Every state write in the engine goes through [`next_state`] or
//! [`apply_event`]; an illegal transition is a loud
//! [`StateMachineError::InvalidTransition`], never a silent overwrite.

use chrono::Utc;
use thiserror::Error;

use super::events::TaskEvent;
use super::states::TaskState;
use crate::models::Task;

#[derive(Debug, Error, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: TaskState, event: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// A completed transition, for audit trails and notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: TaskState,
    pub to: TaskState,
}

/// Pure transition function: the single source of truth for legality.
///
/// Both reconciliation paths call this with marketplace-derived events, so
/// webhook and poll converge on the same state regardless of arrival order.
pub fn next_state(current: TaskState, event: &TaskEvent) -> StateMachineResult<TaskState> {
    let target = match (current, event) {
        // Forward path
        (TaskState::Pending, TaskEvent::Book) => TaskState::WorkerBooked,
        (TaskState::WorkerBooked, TaskEvent::Confirm) => TaskState::WorkerBooked,
        (TaskState::WorkerBooked, TaskEvent::Start) => TaskState::InProgress,
        (TaskState::InProgress, TaskEvent::Complete) => TaskState::Completed,
        // The marketplace may report completion without a started event.
        (TaskState::WorkerBooked, TaskEvent::Complete) => TaskState::Completed,

        // Failure
        (TaskState::WorkerBooked, TaskEvent::Fail(_)) => TaskState::Failed,
        (TaskState::InProgress, TaskEvent::Fail(_)) => TaskState::Failed,

        // Cancellation resets to Pending for a replacement search.
        (TaskState::WorkerBooked, TaskEvent::Cancel(_)) => TaskState::Pending,
        (TaskState::InProgress, TaskEvent::Cancel(_)) => TaskState::Pending,

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from,
                event: event.name().to_string(),
            })
        }
    };

    Ok(target)
}

/// Apply an event to a task, mutating its state and bookkeeping fields.
///
/// Stamps `completed_at` on completion and refreshes `updated_at`. Does
/// not touch the marketplace booking id; clearing that on cancellation is
/// the cancellation handler's job, inside the same logical operation.
pub fn apply_event(task: &mut Task, event: &TaskEvent) -> StateMachineResult<Transition> {
    let from = task.state;
    let to = next_state(from, event)?;

    task.state = to;
    let now = Utc::now();
    if to == TaskState::Completed && task.completed_at.is_none() {
        task.completed_at = Some(now);
    }
    task.updated_at = now;

    Ok(Transition { from, to })
}
