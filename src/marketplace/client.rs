use async_trait::async_trait;
use thiserror::Error;

use super::types::{BookingRef, BookingRequest, BookingSnapshot, SearchOutcome, SearchQuery};

/// Errors from marketplace calls.
///
/// Timeouts and 5xx responses are transient: the booking engine retries
/// them inside its backoff loop rather than surfacing them.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Request timed out")]
    Timeout,

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Marketplace API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode marketplace response: {0}")]
    Decode(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),
}

impl MarketplaceError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Decode(_) | Self::BookingNotFound(_) => false,
        }
    }
}

/// Typed interface to the external worker marketplace.
///
/// Implemented over HTTP in production ([`super::HttpMarketplaceClient`])
/// and by a scriptable double for tests ([`super::MockMarketplaceClient`]).
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Search for workers matching the query. Transport failures are folded
    /// into [`SearchOutcome::Failed`] so callers branch on a single enum.
    async fn search_workers(&self, query: &SearchQuery) -> SearchOutcome;

    /// Create a booking for a specific worker.
    async fn create_booking(&self, request: &BookingRequest)
        -> Result<BookingRef, MarketplaceError>;

    /// Fetch the current status of a booking.
    async fn booking_status(&self, booking_id: &str)
        -> Result<BookingSnapshot, MarketplaceError>;

    /// Cancel a booking. Returns true when the marketplace accepted the
    /// cancellation.
    async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<bool, MarketplaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MarketplaceError::Timeout.is_transient());
        assert!(MarketplaceError::Api {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!MarketplaceError::Api {
            status: 422,
            message: "bad request".to_string()
        }
        .is_transient());
        assert!(!MarketplaceError::Decode("bad json".to_string()).is_transient());
    }
}
