//! Outbound side of the relay: validate a send request and hand it to the
//! messaging client.

use tracing::info;

use super::RelayError;
use crate::whatsapp::{ChatAddress, MediaPayload, MessagingClient, OutboundContent};

/// MIME type assumed for uploads that do not declare one.
pub const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

/// A file received with a send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Raw content.
    pub bytes: Vec<u8>,
    /// Original filename from the upload.
    pub filename: Option<String>,
    /// Declared MIME type.
    pub mimetype: Option<String>,
}

/// An outbound send request, as received from the HTTP caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    /// Recipient phone number (required).
    pub phone: Option<String>,
    /// Caption attached to a file.
    pub caption: Option<String>,
    /// Text to send when no file is given.
    pub message: Option<String>,
    /// Optional file upload.
    pub file: Option<UploadedFile>,
}

/// What was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A file (with optional caption) was sent.
    FileSent,
    /// A text message was sent.
    MessageSent,
}

impl SendOutcome {
    /// Status string reported to the HTTP caller.
    pub fn status(self) -> &'static str {
        match self {
            Self::FileSent => "file sent",
            Self::MessageSent => "message sent",
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SendRequest {
    /// Validate the request and build the outbound content.
    ///
    /// A file takes precedence over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] if the phone number is missing or
    /// there is nothing to send.
    pub fn prepare(self) -> Result<(ChatAddress, OutboundContent, SendOutcome), RelayError> {
        let phone = non_empty(self.phone.map(|p| p.trim().to_owned())).ok_or_else(|| {
            RelayError::Validation("recipient phone number is required".to_owned())
        })?;
        let to = ChatAddress::for_contact(&phone);

        if let Some(file) = self.file {
            let mimetype = non_empty(file.mimetype).unwrap_or_else(|| DEFAULT_UPLOAD_MIME.to_owned());
            let media = MediaPayload::from_bytes(mimetype, &file.bytes, file.filename);
            let content = OutboundContent::Media {
                media,
                caption: non_empty(self.caption),
            };
            return Ok((to, content, SendOutcome::FileSent));
        }

        match non_empty(self.message) {
            Some(text) => Ok((to, OutboundContent::Text(text), SendOutcome::MessageSent)),
            None => Err(RelayError::Validation(
                "nothing to send: provide a file or a message".to_owned(),
            )),
        }
    }
}

/// Validate `request` and send it through `client`. No retry.
///
/// # Errors
///
/// Returns [`RelayError::Validation`] for malformed requests (the client is
/// not called) and [`RelayError::Dispatch`] when the client fails the send.
pub async fn dispatch(
    client: &dyn MessagingClient,
    request: SendRequest,
) -> Result<SendOutcome, RelayError> {
    let (to, content, outcome) = request.prepare()?;

    if let OutboundContent::Media { media, .. } = &content {
        info!(
            chat_id = %to,
            filename = media.filename.as_deref().unwrap_or(""),
            mimetype = %media.mimetype,
            "sending file"
        );
    } else {
        info!(chat_id = %to, "sending text message");
    }

    client.send(&to, content).await?;
    Ok(outcome)
}
