//! WhatsApp adapter: HTTP bridge client, event listener, and session state.
//!
//! Communicates with a WhatsApp Web bridge sidecar via HTTP on port 3001
//! and long-polling for real-time events. The bridge owns authentication,
//! transport, and its own session storage; the relay only sees the
//! [`MessagingClient`] surface defined here.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod events;
pub mod session;

/// Domain suffix appended to a phone number to address an individual contact.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Errors from the WhatsApp adapter.
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    /// HTTP request to the sidecar failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured bridge URL cannot be used to build endpoint URLs.
    #[error("invalid bridge URL: {0}")]
    InvalidBaseUrl(String),

    /// The sidecar container is not running or not reachable.
    #[error("sidecar not running")]
    SidecarNotRunning,

    /// The sidecar answered but refused the operation.
    #[error("{0}")]
    Rejected(String),

    /// Media returned by the sidecar could not be decoded.
    #[error("invalid media payload: {0}")]
    InvalidMedia(String),
}

/// Chat address of an individual contact (`<phone>@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatAddress(String);

impl ChatAddress {
    /// Build the chat address for a contact's phone number.
    pub fn for_contact(phone: &str) -> Self {
        Self(format!("{phone}{CONTACT_SUFFIX}"))
    }

    /// The full address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attachment content as exchanged with the bridge: MIME type plus
/// base64-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Full MIME type, possibly with parameters (`audio/ogg; codecs=opus`).
    pub mimetype: String,
    /// Base64-encoded content.
    pub data: String,
    /// Original filename, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaPayload {
    /// Build a payload from raw bytes.
    pub fn from_bytes(mimetype: impl Into<String>, bytes: &[u8], filename: Option<String>) -> Self {
        Self {
            mimetype: mimetype.into(),
            data: BASE64.encode(bytes),
            filename,
        }
    }

    /// Decode the base64 content into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::InvalidMedia`] if `data` is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, WhatsAppError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|e| WhatsAppError::InvalidMedia(e.to_string()))
    }
}

/// Content of an outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    /// Plain text message.
    Text(String),
    /// File attachment with an optional caption.
    Media {
        /// The file to send.
        media: MediaPayload,
        /// Caption shown under the attachment.
        caption: Option<String>,
    },
}

/// Capability surface of the external messaging client.
///
/// Implementations must be `Send + Sync` so a single client can be shared
/// between the inbound dispatch loop and concurrent HTTP handlers.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Resolve the phone number of a message sender.
    ///
    /// Returns `Ok(None)` when the contact exists but has no number.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the lookup fails.
    async fn contact_number(&self, sender: &str) -> Result<Option<String>, WhatsAppError>;

    /// Download the attachment of a message.
    ///
    /// Returns `Ok(None)` when the client has nothing to deliver.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the download fails.
    async fn download_media(&self, message_id: &str)
        -> Result<Option<MediaPayload>, WhatsAppError>;

    /// Send content to a chat.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the client rejects or fails the send.
    async fn send(&self, to: &ChatAddress, content: OutboundContent) -> Result<(), WhatsAppError>;
}
