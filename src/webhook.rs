//! # Upload Notification Relay
//!
//! Forwards "a file landed in storage" notifications to an external
//! workflow-automation webhook with a small bounded retry.

use std::time::Duration;

use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use utoipa::ToSchema;

use crate::config::WebhookConfig;
use crate::error::{ApiError, internal_error, truncate_body, upstream_error};

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);
const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Body posted to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadNotification {
    pub tenant_id: String,
    pub blob_url: String,
    pub mime: String,
    pub bytes: u64,
    pub original_name: String,
    /// Always empty for now; reserved for user-supplied labels
    pub tags: Vec<String>,
}

/// Successful relay outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelayOutcome {
    /// Always `ok`
    pub status: String,
    pub webhook_status: u16,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("webhook URL not configured")]
    NotConfigured,
    #[error("webhook rejected the notification with status {status}")]
    Rejected { status: u16, body: String },
    #[error("webhook still failing after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        status: Option<u16>,
        body: String,
    },
}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::NotConfigured => internal_error("Webhook URL not configured"),
            RelayError::Rejected { status, body } => {
                upstream_error("webhook rejected", Some(status), &body)
            }
            RelayError::Exhausted { status, body, .. } => {
                upstream_error("webhook unavailable", status, &body)
            }
        }
    }
}

/// Posts [`UploadNotification`]s to the configured webhook.
pub struct WebhookRelay {
    client: Client,
    url: Option<String>,
    secret: Option<String>,
    backoff_step: Duration,
}

impl WebhookRelay {
    pub fn new(config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
            backoff_step: DEFAULT_BACKOFF_STEP,
        })
    }

    /// Override the per-attempt backoff step (attempt `n` sleeps `n * step`).
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver `notification`, retrying 429/5xx and transport failures.
    pub async fn relay(&self, notification: &UploadNotification) -> Result<RelayOutcome, RelayError> {
        let url = self.url.as_deref().ok_or(RelayError::NotConfigured)?;
        let target = redacted_target(url);

        let mut last_status = None;
        let mut last_body = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.client.post(url).json(notification);
            if let Some(secret) = &self.secret {
                request = request.header(SECRET_HEADER, secret);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    counter!("webhook_attempts_total", "outcome" => outcome_label(status))
                        .increment(1);

                    if status.is_success() {
                        info!(
                            target = %target,
                            attempt,
                            status = status.as_u16(),
                            tenant_id = %notification.tenant_id,
                            "Upload notification delivered"
                        );
                        return Ok(RelayOutcome {
                            status: "ok".to_string(),
                            webhook_status: status.as_u16(),
                        });
                    }

                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable(status) {
                        warn!(
                            target = %target,
                            attempt,
                            status = status.as_u16(),
                            "Webhook rejected upload notification"
                        );
                        return Err(RelayError::Rejected {
                            status: status.as_u16(),
                            body: truncate_body(&body),
                        });
                    }

                    warn!(
                        target = %target,
                        attempt,
                        status = status.as_u16(),
                        "Webhook returned transient status"
                    );
                    last_status = Some(status.as_u16());
                    last_body = body;
                }
                Err(err) => {
                    counter!("webhook_attempts_total", "outcome" => "transport_error")
                        .increment(1);
                    warn!(target = %target, attempt, error = %err, "Webhook request failed");
                    last_status = None;
                    last_body = format!("notify failed: {err}");
                }
            }

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.backoff_step * attempt).await;
            }
        }

        Err(RelayError::Exhausted {
            attempts: MAX_ATTEMPTS,
            status: last_status,
            body: truncate_body(&last_body),
        })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

fn outcome_label(status: StatusCode) -> &'static str {
    if status.is_success() {
        "success"
    } else if is_retryable(status) {
        "retryable"
    } else {
        "rejected"
    }
}

fn redacted_target(webhook_url: &str) -> String {
    Url::parse(webhook_url)
        .ok()
        .map(|parsed| {
            let scheme = parsed.scheme();
            let host = parsed.host_str().unwrap_or("unknown");
            format!("{}://{}", scheme, host)
        })
        .unwrap_or_else(|| "[invalid-url]".to_string())
}
