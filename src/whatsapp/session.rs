//! Process-wide WhatsApp session handle.
//!
//! One [`SessionHandle`] owns the messaging client and the observable
//! session lifecycle. It is shared by `Arc` between the inbound dispatch
//! loop (which drives state transitions) and the HTTP server (which reads
//! state and sends through the client).

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::MessagingClient;

/// Lifecycle of the bridge session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the first event from the bridge.
    Initializing,
    /// A pairing code was issued and has not been scanned yet.
    AwaitingPairing,
    /// Authenticated and serving.
    Ready,
    /// The bridge reported the session as lost.
    Disconnected {
        /// Reason reported by the bridge, if any.
        reason: Option<String>,
    },
}

impl SessionState {
    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Ready => "ready",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected {
                reason: Some(reason),
            } => write!(f, "disconnected ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Single owner of the messaging client and its session state.
pub struct SessionHandle {
    client: Arc<dyn MessagingClient>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionHandle {
    /// Wrap a client; the session starts in [`SessionState::Initializing`].
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        Self { client, state_tx }
    }

    /// The shared messaging client.
    pub fn client(&self) -> &dyn MessagingClient {
        self.client.as_ref()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Move to `next`, logging the transition.
    pub fn transition(&self, next: SessionState) {
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            info!(from = %previous, to = %next, "WhatsApp session state changed");
        }
    }
}
