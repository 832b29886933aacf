//! Signaling: wire protocol, transports and the typed channel
//!
//! - [`protocol`]: `{type, data}` JSON envelopes
//! - [`transport`]: the text transport seam
//! - [`websocket`]: tokio-tungstenite implementation of it
//! - [`channel`]: typed messages over a transport

pub mod channel;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use channel::{SignalingChannel, SignalingEvent};
pub use protocol::{DecodeError, SignalingMessage};
pub use transport::{Transport, TransportEvent};
pub use websocket::WebSocketTransport;
