//! # Webhook Ingress
//!
//! Entry point for marketplace push notifications. Verifies the request
//! signature, parses the event payload, and hands the observation to the
//! status reconciler.
//!
//! Signature scheme: hex-encoded HMAC-SHA256 of the raw request body
//! under the shared webhook secret. Verification is skipped in
//! development mode so local marketplaces can post unsigned events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

use super::reconciler::{BookingUpdate, ReconcileOutcome, StatusReconciler};
use super::types::{StatusSource, WebhookAck};
use crate::error::Result;
use crate::marketplace::BookingStatus;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Wire shape of a marketplace webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub booking_id: String,
    /// Explicit booking status; consulted when the event name alone does
    /// not identify one.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

pub struct WebhookIngress {
    reconciler: Arc<StatusReconciler>,
    secret: String,
    /// Development deployments accept unsigned events.
    skip_verification: bool,
}

impl WebhookIngress {
    pub fn new(reconciler: Arc<StatusReconciler>, secret: impl Into<String>) -> Self {
        Self {
            reconciler,
            secret: secret.into(),
            skip_verification: false,
        }
    }

    pub fn with_dev_mode(mut self, dev: bool) -> Self {
        self.skip_verification = dev;
        self
    }

    /// Handle one webhook delivery: raw body plus the signature header.
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookAck> {
        if !self.skip_verification {
            let signature = signature.ok_or(WebhookError::InvalidSignature)?;
            self.verify_signature(body, signature)?;
        }

        let payload: WebhookPayload = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        self.process(payload).await
    }

    /// Constant-time comparison of the expected digest against the
    /// hex-decoded header value.
    fn verify_signature(&self, body: &[u8], signature: &str) -> std::result::Result<(), WebhookError> {
        let provided = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| WebhookError::InvalidSignature)
    }

    async fn process(&self, payload: WebhookPayload) -> Result<WebhookAck> {
        let status = status_for_event(&payload.event).or_else(|| {
            payload
                .status
                .as_deref()
                .and_then(|s| s.parse::<BookingStatus>().ok())
        });
        let Some(status) = status else {
            warn!(event = %payload.event, "Unrecognized webhook event");
            return Ok(WebhookAck::Ignored {
                reason: format!("unrecognized event: {}", payload.event),
            });
        };

        info!(
            event = %payload.event,
            booking_id = %payload.booking_id,
            worker_id = payload.worker_id.as_deref(),
            worker = payload.worker_name.as_deref(),
            "Webhook event received"
        );

        let update = BookingUpdate {
            status,
            reason: payload.reason.clone(),
            completion_photos: payload.photos.clone(),
            worker_feedback: payload.feedback.clone(),
        };

        let outcome = self
            .reconciler
            .apply_update(&payload.booking_id, update, StatusSource::Webhook)
            .await?;

        Ok(match outcome {
            ReconcileOutcome::Transitioned { task_id, .. }
            | ReconcileOutcome::CancellationHandled { task_id, .. }
            | ReconcileOutcome::NoChange { task_id } => WebhookAck::Processed {
                event: payload.event,
                task_id,
            },
            ReconcileOutcome::UnknownBooking => WebhookAck::Ignored {
                reason: format!("unknown booking id: {}", payload.booking_id),
            },
            ReconcileOutcome::StaleUpdate { reason, .. } => WebhookAck::Ignored { reason },
        })
    }
}

/// Map a webhook event name to the booking status it reports.
fn status_for_event(event: &str) -> Option<BookingStatus> {
    match event {
        "booking.confirmed" => Some(BookingStatus::Confirmed),
        "booking.started" => Some(BookingStatus::InProgress),
        "booking.completed" => Some(BookingStatus::Completed),
        "booking.cancelled" => Some(BookingStatus::Cancelled),
        "booking.failed" => Some(BookingStatus::Failed),
        _ => None,
    }
}

/// Compute the signature a sender would attach to `body`. Test helper and
/// reference for marketplace integrations.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
