use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for a property-management task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a worker to be procured.
    Pending,
    /// A marketplace worker is booked for the task.
    WorkerBooked,
    /// The worker has started the physical work.
    InProgress,
    /// Work finished successfully.
    Completed,
    /// Work failed and will not be retried automatically.
    Failed,
}

impl TaskState {
    /// Terminal states admit no further transitions from this engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States in which a marketplace booking id must be present.
    pub fn requires_booking(&self) -> bool {
        matches!(self, Self::WorkerBooked | Self::InProgress | Self::Completed)
    }

    /// States covered by the periodic status poll.
    pub fn is_pollable(&self) -> bool {
        matches!(self, Self::WorkerBooked | Self::InProgress)
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::WorkerBooked => write!(f, "worker_booked"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "worker_booked" => Ok(Self::WorkerBooked),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::WorkerBooked.is_terminal());
        assert!(!TaskState::InProgress.is_terminal());
    }

    #[test]
    fn test_booking_invariant_states() {
        assert!(TaskState::WorkerBooked.requires_booking());
        assert!(TaskState::InProgress.requires_booking());
        assert!(TaskState::Completed.requires_booking());
        assert!(!TaskState::Pending.requires_booking());
        assert!(!TaskState::Failed.requires_booking());
    }

    #[test]
    fn test_pollable_states() {
        assert!(TaskState::WorkerBooked.is_pollable());
        assert!(TaskState::InProgress.is_pollable());
        assert!(!TaskState::Completed.is_pollable());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(TaskState::WorkerBooked.to_string(), "worker_booked");
        assert_eq!(
            "in_progress".parse::<TaskState>().unwrap(),
            TaskState::InProgress
        );
        assert!("running".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&TaskState::WorkerBooked).unwrap();
        assert_eq!(json, "\"worker_booked\"");
        let parsed: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskState::WorkerBooked);
    }
}
