//! Event listener for the WhatsApp bridge.
//!
//! Connects to the bridge's `/events/poll` HTTP long-polling endpoint and
//! forwards lifecycle and message events to a single consumer via an mpsc
//! channel.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Message kind the bridge reports for plain chat text.
pub const CHAT_KIND: &str = "chat";

/// An inbound WhatsApp message as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// Bridge-assigned message identifier, used to download attachments.
    pub id: String,
    /// Sender identifier, used for contact lookup.
    pub from: String,
    /// Message kind (`chat`, `image`, `document`, `ptt`, ...).
    pub kind: String,
    /// Message body; the caption for media messages.
    #[serde(default)]
    pub body: String,
    /// Whether the message carries a downloadable attachment.
    #[serde(default)]
    pub has_media: bool,
}

impl InboundMessage {
    /// Whether this is a plain chat text message.
    pub fn is_chat(&self) -> bool {
        self.kind == CHAT_KIND
    }
}

/// An event from the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum WhatsAppEvent {
    /// A pairing code must be scanned to link a new session.
    #[serde(rename = "qr")]
    PairingChallenge {
        /// Raw pairing code to render as a QR image.
        code: String,
    },
    /// The session is authenticated and ready.
    #[serde(rename = "ready")]
    SessionReady,
    /// The session was lost.
    #[serde(rename = "disconnected")]
    SessionDisconnected {
        /// Human-readable reason, if available.
        #[serde(default)]
        reason: Option<String>,
    },
    /// A new inbound message.
    #[serde(rename = "message")]
    MessageReceived(InboundMessage),
}

/// Initial reconnect backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay after a non-200 poll response (seconds).
const NON_SUCCESS_DELAY_SECS: u64 = 5;

/// Shortest long-poll timeout the listener will use.
pub const MIN_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Decode a poll batch event by event.
///
/// Elements that are not a known event (delivery acks, calls, ...) are
/// skipped so the rest of the batch still reaches the consumer.
pub fn decode_event_batch(batch: Vec<serde_json::Value>) -> Vec<WhatsAppEvent> {
    batch
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<WhatsAppEvent>(raw.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                let kind = raw.get("type").and_then(serde_json::Value::as_str).unwrap_or("?");
                debug!(event_type = kind, error = %e, "skipping unrecognized WhatsApp event");
                None
            }
        })
        .collect()
}

/// Spawn an event listener that forwards events to the given channel.
///
/// Returns immediately. The listener runs as a background Tokio task and
/// reconnects with exponential backoff when the event stream breaks. It
/// exits once the receiving side of `event_tx` is dropped. `poll_timeout`
/// is raised to [`MIN_POLL_TIMEOUT`] when shorter.
pub fn spawn_event_listener(
    base_url: String,
    poll_timeout: Duration,
    event_tx: mpsc::Sender<WhatsAppEvent>,
) -> tokio::task::JoinHandle<()> {
    let poll_timeout = poll_timeout.max(MIN_POLL_TIMEOUT);
    tokio::spawn(async move {
        let poll_url = format!("{}/events/poll", base_url.trim_end_matches('/'));
        let mut backoff_ms: u64 = INITIAL_BACKOFF_MS;

        loop {
            info!(url = %poll_url, "connecting to WhatsApp event stream");

            match poll_events(&poll_url, poll_timeout, &event_tx).await {
                Ok(()) => {
                    info!("WhatsApp event consumer gone, stopping listener");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "WhatsApp event stream error, reconnecting");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    })
}

/// Poll the bridge for events in a loop. Returns `Err` on non-timeout
/// network errors so the caller can reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    poll_timeout: Duration,
    event_tx: &mpsc::Sender<WhatsAppEvent>,
) -> Result<(), reqwest::Error> {
    let client = reqwest::Client::builder().timeout(poll_timeout).build()?;

    loop {
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<Vec<serde_json::Value>>().await {
                    Ok(batch) => {
                        for event in decode_event_batch(batch) {
                            debug!(?event, "received WhatsApp event");
                            if event_tx.send(event).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "event poll body is not a JSON array"),
                }
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::time::sleep(Duration::from_secs(NON_SUCCESS_DELAY_SECS)).await;
            }
            // Long-poll expired with nothing to deliver.
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e),
        }
        if event_tx.is_closed() {
            return Ok(());
        }
    }
}
