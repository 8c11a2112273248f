use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::ApnsCredentials;
use crate::models::PetAttributes;

pub const PRODUCTION_URL: &str = "https://api.push.apple.com";
pub const SANDBOX_URL: &str = "https://api.sandbox.push.apple.com";

/// The error-body reasons APNs uses for a token that will never work again.
const INVALID_TOKEN_REASONS: &[&str] = &["BadDeviceToken", "ExpiredToken", "Unregistered"];

/// Outcome of a failed delivery attempt.
///
/// The two variants drive opposite policies and must never be conflated:
/// `TokenInvalid` means the session is dead and gets pruned; `Transient`
/// means keep the session and let a later push catch it up.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("device token permanently invalid: {reason}")]
    TokenInvalid { reason: String },

    #[error("transient delivery failure (status {status:?}): {body}")]
    Transient { status: Option<u16>, body: String },
}

/// Client for the APNs Live Activity push endpoint.
#[derive(Clone)]
pub struct ApnsClient {
    http: Client,
    base_url: String,
    topic: String,
    credentials: Arc<ApnsCredentials>,
}

impl ApnsClient {
    /// Create a client for the given gateway URL and app bundle.
    ///
    /// `timeout` bounds each delivery attempt end to end, so one hung push
    /// can never stall a whole decay cycle.
    pub fn new(
        base_url: impl Into<String>,
        bundle_id: &str,
        credentials: Arc<ApnsCredentials>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            topic: format!("{}.push-type.liveactivity", bundle_id),
            credentials,
        })
    }

    /// Push the current attributes to one device token.
    ///
    /// Exactly one outbound request; retry policy belongs to the caller.
    pub async fn deliver(
        &self,
        token: &str,
        attributes: &PetAttributes,
    ) -> Result<(), DeliveryError> {
        let assertion = self
            .credentials
            .assertion()
            .map_err(|e| DeliveryError::Transient {
                status: None,
                body: e.to_string(),
            })?;

        let body = serde_json::json!({
            "aps": {
                "timestamp": Utc::now().timestamp(),
                "event": "update",
                "content-state": attributes,
            }
        });

        let response = self
            .http
            .post(format!("{}/3/device/{}", self.base_url, token))
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "liveactivity")
            .bearer_auth(assertion)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if let Some(reason) = INVALID_TOKEN_REASONS.iter().find(|r| body.contains(**r)) {
            Err(DeliveryError::TokenInvalid {
                reason: reason.to_string(),
            })
        } else {
            Err(DeliveryError::Transient {
                status: Some(status.as_u16()),
                body,
            })
        }
    }
}
