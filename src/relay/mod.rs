//! The relay between the WhatsApp bridge and the outside world.
//!
//! - [`adapter`]: inbound events → [`record::NormalizedRecord`] → webhook
//! - [`webhook`]: best-effort webhook delivery
//! - [`dispatch`]: outbound send requests → messaging client

pub mod adapter;
pub mod dispatch;
pub mod record;
pub mod webhook;

use crate::whatsapp::WhatsAppError;

/// Errors surfaced to callers of the relay sender.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The send request is malformed (missing recipient or content).
    #[error("{0}")]
    Validation(String),

    /// The messaging client rejected or failed the send.
    #[error("{0}")]
    Dispatch(String),
}

impl From<WhatsAppError> for RelayError {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::Rejected(message) => Self::Dispatch(message),
            other => Self::Dispatch(other.to_string()),
        }
    }
}
