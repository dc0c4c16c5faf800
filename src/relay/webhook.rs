//! Best-effort delivery of normalized records to the webhook consumer.
//!
//! Every record is POSTed exactly once from a detached task. The caller
//! never waits for the outcome, nothing is retried, and the response body
//! is ignored: a failed delivery is logged and the record is gone.

use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::record::NormalizedRecord;

/// Result of a single delivery attempt, as observed by the detached task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The consumer answered with a 2xx status.
    Delivered {
        /// HTTP status code.
        status: u16,
    },
    /// The request failed or the consumer answered with a non-2xx status.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Validates that the webhook URL has a valid scheme and host.
///
/// Only allows `http` and `https` schemes and requires a host component.
fn validate_webhook_url(url: &str) -> anyhow::Result<reqwest::Url> {
    let parsed = url.parse::<reqwest::Url>()?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        anyhow::bail!("webhook URL scheme must be http or https, got: {}", scheme);
    }

    if parsed.host_str().is_none() {
        anyhow::bail!("webhook URL must have a host");
    }

    Ok(parsed)
}

/// Fire-and-forget webhook client.
#[derive(Clone)]
pub struct BestEffortDelivery {
    http: Client,
    url: reqwest::Url,
}

impl BestEffortDelivery {
    /// Creates a delivery client for the given webhook URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute `http`/`https` URL.
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::new(),
            url: validate_webhook_url(url)?,
        })
    }

    /// The webhook URL records are posted to.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Posts `record` from a detached task and returns immediately.
    ///
    /// The returned handle may be dropped; the task keeps running.
    pub fn deliver(&self, record: NormalizedRecord) -> JoinHandle<DeliveryOutcome> {
        let http = self.http.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let from = record.from.clone();
            let outcome = match http.post(url).json(&record).send().await {
                Ok(resp) if resp.status().is_success() => DeliveryOutcome::Delivered {
                    status: resp.status().as_u16(),
                },
                Ok(resp) => DeliveryOutcome::Failed {
                    reason: format!("webhook returned {}", resp.status()),
                },
                Err(e) => DeliveryOutcome::Failed {
                    reason: e.to_string(),
                },
            };
            match &outcome {
                DeliveryOutcome::Delivered { status } => {
                    info!(%from, status, "record delivered to webhook");
                }
                DeliveryOutcome::Failed { reason } => {
                    warn!(%from, %reason, "webhook delivery failed, record dropped");
                }
            }
            outcome
        })
    }
}
