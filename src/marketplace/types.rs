use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A gig-marketplace worker available for hire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    pub skills: Vec<String>,
    pub location: String,
    /// Hourly rate in `currency`.
    pub rate: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub rating: f64,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Search constraints for a worker query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub location: String,
    pub skill: Option<String>,
    /// Maximum hourly rate in USD.
    pub hourly_budget_max: Option<f64>,
    pub rating_min: Option<f64>,
    pub limit: u32,
}

/// Outcome of a worker search.
///
/// "No candidates" is a control-flow branch (it triggers the fallback
/// search), not an error, so it gets its own variant rather than being
/// conflated with transport failures.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(Vec<Worker>),
    Empty,
    Failed(String),
}

/// Request to book a specific worker for a time window.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub worker_id: String,
    pub task_description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget: f64,
    pub special_requests: Option<String>,
}

/// Marketplace-reported status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown booking status: {s}")),
        }
    }
}

/// A created marketplace booking.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRef {
    pub id: String,
    pub worker_id: String,
    pub worker_name: String,
    pub status: BookingStatus,
    /// Total cost charged by the marketplace, fees included.
    #[serde(default)]
    pub total_cost: f64,
}

/// Current state of a booking as reported by a status fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingSnapshot {
    pub id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub completion_photos: Vec<String>,
    #[serde(default)]
    pub worker_feedback: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_round_trip() {
        assert_eq!(
            "in_progress".parse::<BookingStatus>().unwrap(),
            BookingStatus::InProgress
        );
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
        assert!("paused".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_worker_deserialize_defaults() {
        let worker: Worker = serde_json::from_str(
            r#"{"id":"w1","name":"Maria Garcia","skills":["cleaning"],
                "location":"Las Vegas, NV","rate":25.0,"rating":4.8}"#,
        )
        .unwrap();
        assert_eq!(worker.currency, "USD");
        assert_eq!(worker.reviews, 0);
        assert!(worker.photo_url.is_none());
    }
}
