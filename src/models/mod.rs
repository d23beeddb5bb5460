//! Domain models shared across the orchestration engine.

pub mod automation_config;
pub mod property;
pub mod task;

pub use automation_config::{AutomationConfig, NotificationMethod, WorkerPreference};
pub use property::Property;
pub use task::{AssignedWorker, Task, TaskType};
