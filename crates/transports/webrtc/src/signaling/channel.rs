//! Signaling channel: typed messages over a text [`Transport`]

use super::protocol::{DecodeError, SignalingMessage};
use super::transport::{Transport, TransportEvent};
use crate::session::SessionEndpoint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Event surfaced by [`SignalingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Connected to the relay
    Connected,
    /// Decoded message from the remote peer
    Message(SignalingMessage),
    /// Frame that could not be decoded, already dropped
    Rejected(DecodeError),
    /// Connection closed; last event
    Closed,
    /// Connection failed or could not be established; last event
    Failed(String),
}

/// Owns one transport connection and speaks [`SignalingMessage`]s over it
pub struct SignalingChannel {
    transport: Arc<dyn Transport>,
    closed: Arc<AtomicBool>,
}

impl SignalingChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect to the endpoint
    ///
    /// The first event is `Connected` or `Failed`. Frames are decoded and
    /// delivered one at a time in receipt order; nothing follows `Closed`
    /// or `Failed`.
    pub async fn connect(&self, endpoint: &SessionEndpoint) -> mpsc::UnboundedReceiver<SignalingEvent> {
        let mut transport_events = self.transport.connect(&endpoint.url()).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::clone(&self.closed);

        tokio::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                let (event, last) = match event {
                    TransportEvent::Open => (SignalingEvent::Connected, false),
                    TransportEvent::Text(text) => {
                        debug!(len = text.len(), "Inbound signaling frame");
                        match SignalingMessage::decode(&text) {
                            Ok(msg) => (SignalingEvent::Message(msg), false),
                            Err(e) => {
                                warn!(error = %e, "Rejected inbound frame");
                                (SignalingEvent::Rejected(e), false)
                            }
                        }
                    }
                    TransportEvent::Closed => (SignalingEvent::Closed, true),
                    TransportEvent::Error(reason) => (SignalingEvent::Failed(reason), true),
                };

                if last {
                    closed.store(true, Ordering::SeqCst);
                }
                if tx.send(event).is_err() || last {
                    return;
                }
            }

            // Transport dropped its sender without a terminal event
            if !closed.swap(true, Ordering::SeqCst) {
                let _ = tx.send(SignalingEvent::Closed);
            }
        });

        rx
    }

    /// Send a message; a no-op once the channel is closed
    pub fn send(&self, msg: &SignalingMessage) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(kind = msg.kind(), "Channel closed, dropping outbound message");
            return;
        }
        debug!(kind = msg.kind(), "Outbound signaling message");
        self.transport.send_text(msg.encode());
    }

    /// Close the underlying transport; idempotent
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.transport.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
