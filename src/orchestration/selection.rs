//! Worker selection policy.
//!
//! Pure functions: derive a selection preference from task urgency and
//! host configuration, then rank candidates under that preference.

use chrono::{DateTime, Utc};

use crate::marketplace::Worker;
use crate::models::{AutomationConfig, Task, TaskType, WorkerPreference};

/// Map a task type to the marketplace skill filter. Communication tasks
/// need no specific skill.
pub fn skill_for_task_type(task_type: TaskType) -> Option<&'static str> {
    match task_type {
        TaskType::Cleaning => Some("cleaning"),
        TaskType::Maintenance => Some("handyman"),
        TaskType::Photography => Some("photography"),
        TaskType::Restocking => Some("organizing"),
        TaskType::Communication => None,
    }
}

/// Derive the selection preference for a task.
///
/// Urgent tasks (< 24 h out) prioritize quality; tasks with slack
/// (> 48 h out) optimize for cost; in between, the host's configured
/// per-type preference decides.
pub fn preference_for(task: &Task, config: &AutomationConfig, now: DateTime<Utc>) -> WorkerPreference {
    if task.is_urgent(now) {
        return WorkerPreference::HighestRated;
    }

    if task.hours_until(now) > 48.0 {
        return WorkerPreference::Cheapest;
    }

    config.preference_for(task.task_type)
}

/// Select the best worker under a preference.
///
/// Callers must have checked for an empty candidate list already; calling
/// this with no candidates is a programming error.
///
/// `Nearest` takes the first candidate: the marketplace returns
/// location-sorted results and no independent geodistance is computed.
pub fn select_worker<'a>(workers: &'a [Worker], preference: WorkerPreference) -> &'a Worker {
    assert!(!workers.is_empty(), "select_worker called with no candidates");

    match preference {
        WorkerPreference::Cheapest => workers
            .iter()
            .min_by(|a, b| a.rate.total_cmp(&b.rate))
            .expect("non-empty candidate list"),
        WorkerPreference::HighestRated => workers
            .iter()
            .max_by(|a, b| {
                a.rating
                    .total_cmp(&b.rating)
                    .then(a.reviews.cmp(&b.reviews))
            })
            .expect("non-empty candidate list"),
        WorkerPreference::Nearest => &workers[0],
    }
}
