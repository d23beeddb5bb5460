//! # Booking Engine
//!
//! Orchestrates procurement of a marketplace worker for one task: search
//! under the current constraints, rank candidates, create a booking, and
//! retry with exponential backoff. When a search comes back empty, a
//! fallback search with relaxed constraints runs before the next standard
//! attempt.
//!
//! The engine never errors past its own boundary: every outcome, success
//! or exhaustion, is returned as a [`BookingAttemptResult`] so callers
//! branch on it without error-handling plumbing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::selection::{preference_for, select_worker, skill_for_task_type};
use super::types::BookingAttemptResult;
use crate::audit::AuditLog;
use crate::marketplace::{
    BookingRequest, MarketplaceClient, SearchOutcome, SearchQuery, Worker,
};
use crate::models::{AssignedWorker, AutomationConfig, Property, Task, WorkerPreference};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_BASE: Duration = Duration::from_secs(1);
/// Fallback widens the effective budget by 20%.
const BUDGET_EXPANSION: f64 = 0.2;
/// Fallback lowers the rating floor to a fixed 3.5, overriding the host's
/// configured minimum. Intentional literal behavior.
const FALLBACK_RATING_FLOOR: f64 = 3.5;
const SEARCH_LIMIT: u32 = 20;
const FALLBACK_SEARCH_LIMIT: u32 = 50;

pub struct BookingEngine {
    client: Arc<dyn MarketplaceClient>,
    audit: AuditLog,
    retry_delay_base: Duration,
}

impl BookingEngine {
    pub fn new(client: Arc<dyn MarketplaceClient>, audit: AuditLog) -> Self {
        Self {
            client,
            audit,
            retry_delay_base: RETRY_DELAY_BASE,
        }
    }

    /// Override the backoff base, for tests that should not sleep.
    pub fn with_retry_delay(mut self, base: Duration) -> Self {
        self.retry_delay_base = base;
        self
    }

    /// Book a worker for a task.
    ///
    /// Runs up to three attempts with exponential backoff (1s/2s/4s). Does
    /// not mutate the task; callers project the result onto it.
    pub async fn book_task(
        &self,
        task: &Task,
        property: &Property,
        config: &AutomationConfig,
    ) -> BookingAttemptResult {
        // Idempotency guard against duplicate concurrent invocation.
        if task.has_active_booking() {
            warn!(
                task_id = %task.id,
                booking_id = task.marketplace_booking_id.as_deref(),
                "Task already has an outstanding booking"
            );
            return BookingAttemptResult::failed("Task already booked");
        }

        let location = property.full_address();
        let skill = skill_for_task_type(task.task_type);
        let preference = preference_for(task, config, chrono::Utc::now());

        for attempt in 1..=MAX_ATTEMPTS {
            self.audit.search_initiated(task.id, &location, attempt).await;

            let result = self
                .attempt_booking(
                    task,
                    &location,
                    skill,
                    task.budget,
                    config.minimum_worker_rating,
                    preference,
                    attempt,
                )
                .await;

            match result {
                AttemptOutcome::Booked(result) => {
                    info!(
                        task_id = %task.id,
                        booking_id = result.booking_id.as_deref(),
                        worker = result.worker.as_ref().map(|w| w.name.as_str()),
                        "Booking succeeded"
                    );
                    return result;
                }
                AttemptOutcome::NoCandidates => {
                    // Relax constraints once before consuming another
                    // standard attempt.
                    info!(task_id = %task.id, attempt, "No candidates, trying fallback search");
                    if let AttemptOutcome::Booked(result) = self
                        .attempt_fallback_booking(task, &location, skill, preference, attempt)
                        .await
                    {
                        return result;
                    }
                }
                AttemptOutcome::Failed(error) => {
                    warn!(task_id = %task.id, attempt, error = %error, "Booking attempt failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                let delay = self.retry_delay_base * 2u32.pow(attempt - 1);
                self.audit
                    .retry_initiated(task.id, attempt + 1, delay.as_millis() as u64)
                    .await;
                info!(task_id = %task.id, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }

        let error = format!("Failed after {MAX_ATTEMPTS} attempts");
        self.audit.booking_failed(task.id, &error, MAX_ATTEMPTS).await;
        BookingAttemptResult::failed(error)
    }

    async fn attempt_booking(
        &self,
        task: &Task,
        location: &str,
        skill: Option<&str>,
        budget: f64,
        rating_min: f64,
        preference: WorkerPreference,
        attempt: u32,
    ) -> AttemptOutcome {
        let query = SearchQuery {
            location: location.to_string(),
            skill: skill.map(|s| s.to_string()),
            hourly_budget_max: Some(budget / task.duration_hours),
            rating_min: Some(rating_min),
            limit: SEARCH_LIMIT,
        };

        let workers = match self.client.search_workers(&query).await {
            SearchOutcome::Found(workers) => workers,
            SearchOutcome::Empty => return AttemptOutcome::NoCandidates,
            SearchOutcome::Failed(error) => return AttemptOutcome::Failed(error),
        };
        self.audit
            .search_completed(task.id, workers.len(), attempt)
            .await;

        let best = select_worker(&workers, preference);
        self.create_booking_for(task, best, budget, &task.description, attempt)
            .await
    }

    /// Expanded-criteria retry when the primary search found nobody:
    /// +20% budget, rating floor 3.5, larger result window.
    async fn attempt_fallback_booking(
        &self,
        task: &Task,
        location: &str,
        skill: Option<&str>,
        preference: WorkerPreference,
        attempt: u32,
    ) -> AttemptOutcome {
        let expanded_budget = task.budget * (1.0 + BUDGET_EXPANSION);

        self.audit
            .fallback_triggered(task.id, expanded_budget, FALLBACK_RATING_FLOOR, attempt)
            .await;

        let query = SearchQuery {
            location: location.to_string(),
            skill: skill.map(|s| s.to_string()),
            hourly_budget_max: Some(expanded_budget / task.duration_hours),
            rating_min: Some(FALLBACK_RATING_FLOOR),
            limit: FALLBACK_SEARCH_LIMIT,
        };

        let workers = match self.client.search_workers(&query).await {
            SearchOutcome::Found(workers) => workers,
            SearchOutcome::Empty => {
                return AttemptOutcome::Failed("No workers found even with expanded search".to_string())
            }
            SearchOutcome::Failed(error) => return AttemptOutcome::Failed(error),
        };
        self.audit
            .search_completed(task.id, workers.len(), attempt)
            .await;

        let best = select_worker(&workers, preference);
        let description = format!("{} [EXPANDED SEARCH]", task.description);
        self.create_booking_for(task, best, expanded_budget, &description, attempt)
            .await
    }

    async fn create_booking_for(
        &self,
        task: &Task,
        worker: &Worker,
        budget: f64,
        description: &str,
        attempt: u32,
    ) -> AttemptOutcome {
        self.audit.booking_attempted(task.id, &worker.id, attempt).await;

        let request = BookingRequest {
            worker_id: worker.id.clone(),
            task_description: description.to_string(),
            start_time: task.scheduled_at,
            end_time: task.scheduled_end(),
            budget,
            special_requests: task.host_notes.clone(),
        };

        match self.client.create_booking(&request).await {
            Ok(booking) => {
                self.audit
                    .booking_created(task.id, &booking.id, &worker.id, booking.total_cost, attempt)
                    .await;

                AttemptOutcome::Booked(BookingAttemptResult::booked(
                    booking.id,
                    AssignedWorker {
                        id: worker.id.clone(),
                        name: worker.name.clone(),
                        photo_url: worker.photo_url.clone(),
                        rating: worker.rating,
                        reviews: worker.reviews,
                        confirmed: false,
                    },
                    booking.total_cost,
                ))
            }
            Err(err) => AttemptOutcome::Failed(format!("Failed to create booking: {err}")),
        }
    }
}

enum AttemptOutcome {
    Booked(BookingAttemptResult),
    NoCandidates,
    Failed(String),
}
