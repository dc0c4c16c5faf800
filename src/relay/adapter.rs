//! Inbound side of the relay: one dispatch loop over bridge events.
//!
//! Lifecycle events update the shared [`SessionHandle`]; each inbound
//! message is normalized into a [`NormalizedRecord`] and handed to
//! [`BestEffortDelivery`]. Events are handled strictly one at a time, in
//! channel order. Nothing that goes wrong while handling one event stops
//! the loop.

use std::sync::Arc;

use chrono::Utc;
use qrcode::render::unicode;
use qrcode::QrCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::record::{NormalizedRecord, UNKNOWN_SENDER};
use super::webhook::{BestEffortDelivery, DeliveryOutcome};
use crate::whatsapp::events::{InboundMessage, WhatsAppEvent};
use crate::whatsapp::session::{SessionHandle, SessionState};

/// Presents a pairing code to the operator.
pub trait PairingRenderer: Send + Sync {
    /// Show `code` so it can be scanned from the phone.
    fn render(&self, code: &str);
}

/// Renders pairing codes as a unicode QR code on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderer;

impl PairingRenderer for TerminalRenderer {
    fn render(&self, code: &str) {
        match render_qr(code) {
            Ok(image) => println!("Scan this code with WhatsApp (Linked devices):\n{image}"),
            Err(e) => {
                warn!(error = %e, "failed to render pairing QR code, printing raw code");
                println!("Pairing code: {code}");
            }
        }
    }
}

/// Render `code` as a compact unicode QR code (two modules per character).
///
/// # Errors
///
/// Returns an error if the code does not fit in a QR symbol.
pub fn render_qr(code: &str) -> Result<String, qrcode::types::QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// Consumes bridge events and relays inbound messages.
pub struct MessageAdapter {
    session: Arc<SessionHandle>,
    delivery: BestEffortDelivery,
    renderer: Arc<dyn PairingRenderer>,
}

impl MessageAdapter {
    /// Create an adapter bound to the shared session.
    pub fn new(
        session: Arc<SessionHandle>,
        delivery: BestEffortDelivery,
        renderer: Arc<dyn PairingRenderer>,
    ) -> Self {
        Self {
            session,
            delivery,
            renderer,
        }
    }

    /// Handle events until the channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<WhatsAppEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("WhatsApp event channel closed, dispatch loop stopping");
    }

    /// Handle a single event to completion.
    pub async fn handle_event(&self, event: WhatsAppEvent) {
        match event {
            WhatsAppEvent::PairingChallenge { code } => {
                info!("WhatsApp pairing required");
                self.session.transition(SessionState::AwaitingPairing);
                self.renderer.render(&code);
            }
            WhatsAppEvent::SessionReady => {
                info!("WhatsApp client ready and authenticated");
                self.session.transition(SessionState::Ready);
            }
            WhatsAppEvent::SessionDisconnected { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("unknown"), "WhatsApp disconnected");
                self.session
                    .transition(SessionState::Disconnected { reason });
            }
            WhatsAppEvent::MessageReceived(message) => {
                // Delivery runs detached; the handle is not awaited.
                drop(self.on_message(&message).await);
            }
        }
    }

    /// Normalize `message` and start its delivery.
    pub async fn on_message(&self, message: &InboundMessage) -> JoinHandle<DeliveryOutcome> {
        let record = self.normalize(message).await;
        debug!(
            from = %record.from,
            kind = ?record.kind,
            has_media = record.has_media(),
            "relaying inbound message"
        );
        self.delivery.deliver(record)
    }

    /// Build the normalized record for `message`.
    ///
    /// Contact lookup and media download failures degrade the record
    /// (`from = "unknown"`, no media fields) instead of failing.
    pub async fn normalize(&self, message: &InboundMessage) -> NormalizedRecord {
        let client = self.session.client();

        let from = match client.contact_number(&message.from).await {
            Ok(Some(number)) => number,
            Ok(None) => UNKNOWN_SENDER.to_owned(),
            Err(e) => {
                debug!(sender = %message.from, error = %e, "contact lookup failed");
                UNKNOWN_SENDER.to_owned()
            }
        };

        let mut record = NormalizedRecord::new(from, Utc::now());

        if message.is_chat() {
            record.set_text(&message.body);
        }

        if message.has_media {
            match client.download_media(&message.id).await {
                Ok(Some(media)) => {
                    if let Err(e) = record.attach_media(&media) {
                        debug!(message_id = %message.id, error = %e, "dropping undecodable media");
                    }
                }
                Ok(None) => debug!(message_id = %message.id, "bridge returned no media"),
                Err(e) => debug!(message_id = %message.id, error = %e, "media download failed"),
            }
        }

        record
    }
}
