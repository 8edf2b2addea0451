//! Signed webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs the JSON of a terminal [`JobEvent`] to the URL
//! registered with the job. The body is signed with the job's secret (see
//! [`onlyvalid_core::signing`]). Failed attempts are retried three times,
//! after 1 s, 2 s and 4 s.

use std::time::Duration;

use onlyvalid_core::job_events::JobEvent;
use onlyvalid_core::signing::{compute_webhook_signature, SIGNATURE_HEADER};
use reqwest::header::CONTENT_TYPE;

/// Backoff before each retry (1 s, 2 s, 4 s).
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Network, DNS or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers job events to customer webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default webhook HTTP client");
                reqwest::Client::new()
            });
        Self {
            client,
            retry_delays: RETRY_DELAYS.to_vec(),
        }
    }

    /// Replace the retry schedule. Used by tests to avoid real sleeps.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver `event` to `url`, signing the body with `secret`.
    ///
    /// Returns `Ok(())` on the first 2xx response, otherwise the last error
    /// after all retries are spent.
    pub async fn deliver(
        &self,
        url: &str,
        secret: &str,
        event: &JobEvent,
    ) -> Result<(), WebhookError> {
        let body = serde_json::to_string(event)?;
        let signature = compute_webhook_signature(secret, &body);

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, &body, &signature).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        job_id = %event.job_id(),
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(url, &body, &signature).await.inspect_err(|e| {
            tracing::error!(
                url,
                job_id = %event.job_id(),
                error = %e,
                "Webhook delivery failed after all retries"
            );
        })
    }

    async fn try_send(&self, url: &str, body: &str, signature: &str) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_owned())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}
