use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::task::TaskType;

/// Preference for ranking candidate workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPreference {
    Nearest,
    Cheapest,
    HighestRated,
}

impl fmt::Display for WorkerPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Cheapest => write!(f, "cheapest"),
            Self::HighestRated => write!(f, "highest_rated"),
        }
    }
}

/// Notification delivery method for host updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    Email,
    Sms,
    Push,
}

/// Per-host automation policy: which task types auto-book, how workers
/// are selected for each, and the floors/limits the booking engine honors.
///
/// Read-only to the engine; hosts mutate it through the (out of scope)
/// CRUD surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub id: Uuid,
    pub host_id: Uuid,
    pub auto_book_cleaning: bool,
    pub auto_book_maintenance: bool,
    pub auto_book_photography: bool,
    pub auto_respond_to_guests: bool,
    pub cleaning_preference: WorkerPreference,
    pub maintenance_preference: WorkerPreference,
    pub minimum_worker_rating: f64,
    pub max_booking_lead_time_days: u32,
    pub notification_method: NotificationMethod,
}

impl AutomationConfig {
    /// In-memory default policy for a host with no persisted config.
    /// Never written back as a side effect of a read.
    pub fn default_for_host(host_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            host_id,
            auto_book_cleaning: true,
            auto_book_maintenance: true,
            auto_book_photography: false,
            auto_respond_to_guests: false,
            cleaning_preference: WorkerPreference::HighestRated,
            maintenance_preference: WorkerPreference::Nearest,
            minimum_worker_rating: 4.0,
            max_booking_lead_time_days: 3,
            notification_method: NotificationMethod::Email,
        }
    }

    /// Whether auto-booking is enabled for the given task type.
    ///
    /// Restocking follows the cleaning flag; communication follows the
    /// auto-respond flag.
    pub fn auto_book_enabled(&self, task_type: TaskType) -> bool {
        match task_type {
            TaskType::Cleaning | TaskType::Restocking => self.auto_book_cleaning,
            TaskType::Maintenance => self.auto_book_maintenance,
            TaskType::Photography => self.auto_book_photography,
            TaskType::Communication => self.auto_respond_to_guests,
        }
    }

    /// Configured selection preference for a task type. Cleaning and
    /// maintenance have independent settings; other types default to the
    /// cleaning preference.
    pub fn preference_for(&self, task_type: TaskType) -> WorkerPreference {
        match task_type {
            TaskType::Maintenance => self.maintenance_preference,
            _ => self.cleaning_preference,
        }
    }
}
