//! # Turnover Core
//!
//! Booking orchestration engine for short-term-rental operations: books
//! gig-marketplace workers for property tasks (cleaning, maintenance,
//! photography, restocking), tracks each booking through its lifecycle,
//! and recovers from worker cancellations automatically.
//!
//! ## Architecture
//!
//! - **models**: tasks, properties, and per-host automation policy
//! - **state_machine**: the task lifecycle and its legal transitions
//! - **marketplace**: the worker-marketplace client (HTTP and mock)
//! - **orchestration**: booking engine, auto-book scheduler, status
//!   reconciler, cancellation handler, webhook ingress
//! - **audit**: the per-task decision trail, persisted and broadcast
//! - **repository**: injected persistence and side-effect interfaces
//!
//! Persistence, notification delivery, and payments sit behind traits in
//! [`repository`]; the engine never talks to storage directly. In-memory
//! implementations back the test suite and local development.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnover_core::audit::AuditLog;
//! use turnover_core::marketplace::MockMarketplaceClient;
//! use turnover_core::orchestration::BookingEngine;
//! use turnover_core::repository::memory::InMemoryAuditLogRepository;
//!
//! let client = Arc::new(MockMarketplaceClient::with_default_roster());
//! let audit = AuditLog::new(Arc::new(InMemoryAuditLogRepository::new()));
//! let engine = BookingEngine::new(client, audit);
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod marketplace;
pub mod models;
pub mod orchestration;
pub mod repository;
pub mod state_machine;

pub use config::EngineConfig;
pub use error::{EngineError, Result};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Process environment variables are shared across the parallel test
    /// threads. Every test that mutates them must hold this lock.
    pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
