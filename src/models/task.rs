use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::TaskState;

/// Type of property-management work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Cleaning,
    Maintenance,
    Photography,
    Communication,
    Restocking,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleaning => write!(f, "cleaning"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Photography => write!(f, "photography"),
            Self::Communication => write!(f, "communication"),
            Self::Restocking => write!(f, "restocking"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cleaning" => Ok(Self::Cleaning),
            "maintenance" => Ok(Self::Maintenance),
            "photography" => Ok(Self::Photography),
            "communication" => Ok(Self::Communication),
            "restocking" => Ok(Self::Restocking),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

/// Summary of the marketplace worker assigned to a task.
///
/// Stored on the task once a booking succeeds; cleared again when the
/// worker cancels. A concrete struct rather than a loose JSON map so the
/// repository boundary validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedWorker {
    pub id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub rating: f64,
    pub reviews: u32,
    /// Set when the marketplace pushes `booking.confirmed`.
    #[serde(default)]
    pub confirmed: bool,
}

/// A schedulable unit of physical property-management work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub property_id: Uuid,
    /// Reservation that generated this task, if any.
    pub reservation_id: Option<Uuid>,
    pub description: String,
    pub required_skills: Vec<String>,
    /// Total budget for the task in USD.
    pub budget: f64,
    pub scheduled_at: DateTime<Utc>,
    pub duration_hours: f64,
    /// Optional hard deadline for on-time tracking.
    pub deadline: Option<DateTime<Utc>>,
    pub state: TaskState,
    /// Marketplace booking id. Set when a booking is created and cleared
    /// only by the cancellation rollback; completed and failed tasks keep
    /// their last booking id for traceability.
    pub marketplace_booking_id: Option<String>,
    pub assigned_worker: Option<AssignedWorker>,
    #[serde(default)]
    pub completion_photos: Vec<String>,
    pub worker_feedback: Option<String>,
    pub host_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task with the minimum required fields.
    pub fn new(
        task_type: TaskType,
        property_id: Uuid,
        description: impl Into<String>,
        budget: f64,
        scheduled_at: DateTime<Utc>,
        duration_hours: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            property_id,
            reservation_id: None,
            description: description.into(),
            required_skills: Vec::new(),
            budget,
            scheduled_at,
            duration_hours,
            deadline: None,
            state: TaskState::default(),
            marketplace_booking_id: None,
            assigned_worker: None,
            completion_photos: Vec::new(),
            worker_feedback: None,
            host_notes: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Hours between `now` and the scheduled start. Negative when overdue.
    pub fn hours_until(&self, now: DateTime<Utc>) -> f64 {
        (self.scheduled_at - now).num_seconds() as f64 / 3600.0
    }

    /// A task is urgent when it starts within 24 hours.
    pub fn is_urgent(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at - now < Duration::hours(24)
    }

    /// Scheduled end of the work window.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::seconds((self.duration_hours * 3600.0) as i64)
    }

    /// Budget converted to an hourly ceiling for worker search.
    pub fn hourly_budget(&self) -> f64 {
        self.budget / self.duration_hours
    }

    /// Whether an active marketplace booking is outstanding.
    pub fn has_active_booking(&self) -> bool {
        self.marketplace_booking_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(scheduled_at: DateTime<Utc>) -> Task {
        Task::new(
            TaskType::Cleaning,
            Uuid::new_v4(),
            "Turnover clean",
            100.0,
            scheduled_at,
            2.0,
        )
    }

    #[test]
    fn test_urgency_window() {
        let now = Utc::now();
        assert!(sample_task(now + Duration::hours(6)).is_urgent(now));
        assert!(sample_task(now - Duration::hours(1)).is_urgent(now));
        assert!(!sample_task(now + Duration::hours(30)).is_urgent(now));
    }

    #[test]
    fn test_hourly_budget() {
        let task = sample_task(Utc::now());
        assert!((task.hourly_budget() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scheduled_end() {
        let start = Utc::now();
        let task = sample_task(start);
        assert_eq!(task.scheduled_end(), start + Duration::hours(2));
    }

    #[test]
    fn test_task_type_string_round_trip() {
        assert_eq!(TaskType::Restocking.to_string(), "restocking");
        assert_eq!("handyman".parse::<TaskType>().ok(), None);
        assert_eq!(
            "maintenance".parse::<TaskType>().unwrap(),
            TaskType::Maintenance
        );
    }
}
