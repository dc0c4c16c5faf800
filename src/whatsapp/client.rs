//! HTTP client for the WhatsApp Web bridge sidecar.
//!
//! All WhatsApp operations go through this client, which communicates
//! with the bridge via HTTP on port 3001. Every bridge response is wrapped
//! in a `{ success, data, error }` envelope.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatAddress, MediaPayload, MessagingClient, OutboundContent, WhatsAppError};

/// Default port the WhatsApp bridge listens on.
pub const DEFAULT_BRIDGE_PORT: u16 = 3001;

/// Number of health-check retries before giving up.
const HEALTH_CHECK_RETRIES: u32 = 5;

/// Delay between health-check attempts in milliseconds.
const HEALTH_CHECK_DELAY_MS: u64 = 2000;

/// Client for the WhatsApp Web HTTP bridge.
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
}

/// A WhatsApp contact entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppContact {
    /// Contact identifier as reported by the bridge.
    pub id: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// Phone number, if known.
    pub number: Option<String>,
}

/// Connection status from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppStatus {
    /// Whether the sidecar is connected to WhatsApp.
    pub connected: bool,
    /// The phone number linked, if connected.
    pub phone_number: Option<String>,
}

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Body of `POST /send`.
#[derive(Serialize)]
struct SendBody<'a> {
    chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<&'a MediaPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

impl WhatsAppClient {
    /// Create a new client pointing at the given base URL.
    pub fn new(base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client connecting to `http://127.0.0.1:{port}`.
    pub fn with_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    /// Create a client using the default bridge port (3001).
    pub fn default_url() -> Self {
        Self::with_port(DEFAULT_BRIDGE_PORT)
    }

    /// Returns the base URL of the sidecar.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the sidecar is healthy and connected to WhatsApp.
    pub async fn health_check(&self) -> bool {
        match self.status().await {
            Ok(status) => status.connected,
            Err(e) => {
                debug!(error = %e, "bridge health check failed");
                false
            }
        }
    }

    /// Wait for the sidecar to become healthy, retrying with a fixed delay.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::SidecarNotRunning`] once all retries are spent.
    pub async fn wait_healthy(&self) -> Result<(), WhatsAppError> {
        for attempt in 0..HEALTH_CHECK_RETRIES {
            if self.health_check().await {
                return Ok(());
            }
            if attempt < HEALTH_CHECK_RETRIES.saturating_sub(1) {
                tokio::time::sleep(std::time::Duration::from_millis(HEALTH_CHECK_DELAY_MS)).await;
            }
        }
        Err(WhatsAppError::SidecarNotRunning)
    }

    /// Get the current connection status from the sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the bridge is unreachable or answers
    /// without a status.
    pub async fn status(&self) -> Result<WhatsAppStatus, WhatsAppError> {
        let resp = self.client.get(self.endpoint(&["status"])?).send().await?;
        read_envelope::<WhatsAppStatus>(resp)
            .await?
            .ok_or(WhatsAppError::SidecarNotRunning)
    }

    /// Get the current pairing code for WhatsApp Web linking.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::Rejected`] when the bridge has no code to
    /// offer (for example because a session is already linked).
    pub async fn pairing_code(&self) -> Result<String, WhatsAppError> {
        let resp = self.client.get(self.endpoint(&["qr"])?).send().await?;
        read_envelope::<String>(resp)
            .await?
            .ok_or_else(|| WhatsAppError::Rejected("no pairing code available".to_owned()))
    }

    /// Look up a contact by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the bridge is unreachable or refuses.
    pub async fn contact(&self, id: &str) -> Result<Option<WhatsAppContact>, WhatsAppError> {
        let resp = self
            .client
            .get(self.endpoint(&["contacts", id])?)
            .send()
            .await?;
        read_envelope(resp).await
    }

    /// Build an endpoint URL, percent-encoding each path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, WhatsAppError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| WhatsAppError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| WhatsAppError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl MessagingClient for WhatsAppClient {
    async fn contact_number(&self, sender: &str) -> Result<Option<String>, WhatsAppError> {
        let contact = self.contact(sender).await?;
        Ok(contact
            .and_then(|c| c.number)
            .filter(|n| !n.trim().is_empty()))
    }

    async fn download_media(
        &self,
        message_id: &str,
    ) -> Result<Option<MediaPayload>, WhatsAppError> {
        let resp = self
            .client
            .get(self.endpoint(&["media", message_id])?)
            .send()
            .await?;
        read_envelope(resp).await
    }

    async fn send(&self, to: &ChatAddress, content: OutboundContent) -> Result<(), WhatsAppError> {
        let body = match &content {
            OutboundContent::Text(text) => SendBody {
                chat_id: to.as_str(),
                text: Some(text),
                media: None,
                caption: None,
            },
            OutboundContent::Media { media, caption } => SendBody {
                chat_id: to.as_str(),
                text: None,
                media: Some(media),
                caption: caption.as_deref(),
            },
        };
        let resp = self
            .client
            .post(self.endpoint(&["send"])?)
            .json(&body)
            .send()
            .await?;
        read_envelope::<serde_json::Value>(resp).await?;
        debug!(chat_id = %to, "message sent via WhatsApp");
        Ok(())
    }
}

/// Unwrap a bridge envelope, turning refusals into [`WhatsAppError::Rejected`].
async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<Option<T>, WhatsAppError> {
    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<BridgeResponse<serde_json::Value>>(&body_text)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| format!("bridge returned {status}: {body_text}"));
        warn!(%status, "bridge request failed: {message}");
        return Err(WhatsAppError::Rejected(message));
    }

    let body: BridgeResponse<T> = resp.json().await?;
    if !body.success {
        return Err(WhatsAppError::Rejected(
            body.error
                .unwrap_or_else(|| "bridge reported failure".to_owned()),
        ));
    }
    Ok(body.data)
}
