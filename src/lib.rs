//! wa-relay: a thin relay between a WhatsApp Web bridge and HTTP.
//!
//! Inbound WhatsApp messages are normalized and POSTed to a webhook
//! consumer; `POST /send` forwards outbound text and files to contacts.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod relay;
pub mod server;
pub mod whatsapp;
