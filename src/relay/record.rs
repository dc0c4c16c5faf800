//! Normalized message record sent to the webhook consumer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::whatsapp::{MediaPayload, WhatsAppError};

/// Sender value used when the contact lookup yields no number.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Plain text message.
    Text,
    /// Message with a downloaded attachment.
    Media,
}

/// One inbound message, flattened for JSON transport.
///
/// Absent fields are omitted from the JSON body rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Sender phone number or [`UNKNOWN_SENDER`].
    pub from: String,
    /// When the relay processed the event (ISO-8601, UTC, milliseconds).
    pub timestamp: String,
    /// `text` or `media`; absent for messages that are neither chat text
    /// nor carry a retrievable attachment.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordKind>,
    /// Chat body, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Full MIME type of the attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// File extension derived from the MIME subtype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    /// Attachment bytes, hex-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_data: Option<String>,
}

impl NormalizedRecord {
    /// Start a record for `from`, stamped with `at`.
    pub fn new(from: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            from: from.into(),
            timestamp: format_timestamp(at),
            kind: None,
            content: None,
            media_type: None,
            ext: None,
            media_data: None,
        }
    }

    /// Mark the record as chat text.
    pub fn set_text(&mut self, body: &str) {
        self.kind = Some(RecordKind::Text);
        self.content = Some(body.to_owned());
    }

    /// Attach downloaded media, re-encoding its bytes as hex.
    ///
    /// Leaves the record untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::InvalidMedia`] if the payload is not valid base64.
    pub fn attach_media(&mut self, media: &MediaPayload) -> Result<(), WhatsAppError> {
        let bytes = media.decode()?;
        self.kind = Some(RecordKind::Media);
        self.ext = Some(extension_from_mime(&media.mimetype));
        self.media_type = Some(media.mimetype.clone());
        self.media_data = Some(hex::encode(bytes));
        Ok(())
    }

    /// Whether the record carries attachment fields.
    pub fn has_media(&self) -> bool {
        self.media_data.is_some()
    }
}

/// File extension for a MIME type: the subtype, cut at the first `;`.
///
/// A MIME string without a `/` yields an empty extension.
pub fn extension_from_mime(mimetype: &str) -> String {
    mimetype
        .split_once('/')
        .and_then(|(_, subtype)| subtype.split(';').next())
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}

/// ISO-8601 UTC timestamp with millisecond precision and `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
