//! Production marketplace client over HTTP.
//!
//! Uses a shared `reqwest::Client` with connection pooling and a bounded
//! per-call timeout. Booking creation retries transient failures with
//! exponential backoff; search failures are folded into
//! [`SearchOutcome::Failed`] so the booking engine can distinguish "no
//! candidates" from "the marketplace is down".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::client::{MarketplaceClient, MarketplaceError};
use super::types::{BookingRef, BookingRequest, BookingSnapshot, SearchOutcome, SearchQuery, Worker};
use crate::config::EngineConfig;

const USER_AGENT: &str = concat!("turnover-core/", env!("CARGO_PKG_VERSION"));
const CREATE_MAX_RETRIES: u32 = 3;
const CREATE_RETRY_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    workers: Vec<Worker>,
}

pub struct HttpMarketplaceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpMarketplaceClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.marketplace_base_url.clone(),
            config.marketplace_api_key.clone(),
            Duration::from_secs(config.marketplace_timeout_secs),
        )
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn classify(err: reqwest::Error) -> MarketplaceError {
        if err.is_timeout() {
            MarketplaceError::Timeout
        } else {
            MarketplaceError::Transport(err.to_string())
        }
    }

    async fn api_error(response: reqwest::Response) -> MarketplaceError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        MarketplaceError::Api { status, message }
    }
}

#[async_trait]
impl MarketplaceClient for HttpMarketplaceClient {
    async fn search_workers(&self, query: &SearchQuery) -> SearchOutcome {
        let mut params: Vec<(&str, String)> = vec![
            ("location", query.location.clone()),
            ("limit", query.limit.min(100).to_string()),
        ];
        if let Some(skill) = &query.skill {
            params.push(("skill", skill.clone()));
        }
        if let Some(budget) = query.hourly_budget_max {
            params.push(("budget_max", budget.to_string()));
        }
        if let Some(rating) = query.rating_min {
            params.push(("rating_min", rating.to_string()));
        }

        let result = self
            .client
            .get(format!("{}/workers/search", self.base_url))
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&params)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, location = %query.location, "Worker search failed");
                return SearchOutcome::Failed(err.to_string());
            }
        };

        if !response.status().is_success() {
            let err = Self::api_error(response).await;
            error!(error = %err, "Worker search rejected");
            return SearchOutcome::Failed(err.to_string());
        }

        match response.json::<SearchResponse>().await {
            Ok(body) if body.workers.is_empty() => SearchOutcome::Empty,
            Ok(body) => {
                info!(
                    count = body.workers.len(),
                    location = %query.location,
                    skill = query.skill.as_deref(),
                    "Worker search completed"
                );
                SearchOutcome::Found(body.workers)
            }
            Err(err) => SearchOutcome::Failed(format!("decode error: {err}")),
        }
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingRef, MarketplaceError> {
        let mut last_error = MarketplaceError::Transport("no attempt made".to_string());

        for attempt in 0..CREATE_MAX_RETRIES {
            let result = self
                .client
                .post(format!("{}/bookings", self.base_url))
                .header(header::AUTHORIZATION, self.auth_header())
                .json(request)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let booking: BookingRef = response
                        .json()
                        .await
                        .map_err(|e| MarketplaceError::Decode(e.to_string()))?;
                    info!(
                        booking_id = %booking.id,
                        worker = %booking.worker_name,
                        "Booking created"
                    );
                    return Ok(booking);
                }
                Ok(response) => {
                    last_error = Self::api_error(response).await;
                }
                Err(err) => {
                    last_error = Self::classify(err);
                }
            }

            if !last_error.is_transient() {
                return Err(last_error);
            }

            warn!(
                attempt = attempt + 1,
                max = CREATE_MAX_RETRIES,
                error = %last_error,
                "Booking creation attempt failed"
            );
            if attempt + 1 < CREATE_MAX_RETRIES {
                tokio::time::sleep(CREATE_RETRY_BASE * 2u32.pow(attempt)).await;
            }
        }

        error!(error = %last_error, "Booking creation exhausted retries");
        Err(last_error)
    }

    async fn booking_status(&self, booking_id: &str) -> Result<BookingSnapshot, MarketplaceError> {
        let response = self
            .client
            .get(format!("{}/bookings/{booking_id}", self.base_url))
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(Self::classify)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(MarketplaceError::BookingNotFound(booking_id.to_string())),
            status if status.is_success() => response
                .json::<BookingSnapshot>()
                .await
                .map_err(|e| MarketplaceError::Decode(e.to_string())),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<bool, MarketplaceError> {
        let body = serde_json::json!({ "reason": reason });

        let response = self
            .client
            .post(format!("{}/bookings/{booking_id}/cancel", self.base_url))
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(Self::classify)?;

        if response.status().is_success() {
            info!(booking_id = %booking_id, "Booking cancelled");
            Ok(true)
        } else {
            let err = Self::api_error(response).await;
            warn!(booking_id = %booking_id, error = %err, "Booking cancellation rejected");
            Ok(false)
        }
    }
}
