use thiserror::Error;

/// Top-level error type for the orchestration engine.
///
/// Module-specific errors (state machine, marketplace, repositories,
/// webhook ingress) convert into this type at the crate boundary so
/// callers only need a single error to match on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Repository error: {0}")]
    Repository(#[from] crate::repository::RepositoryError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] crate::state_machine::StateMachineError),

    #[error("Marketplace error: {0}")]
    Marketplace(#[from] crate::marketplace::MarketplaceError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] crate::orchestration::webhook::WebhookError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Booking failed: {0}")]
    BookingFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
