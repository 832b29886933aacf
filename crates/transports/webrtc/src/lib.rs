//! WebRTC signaling client for two-peer rooms
//!
//! This crate connects to a room-based websocket relay, negotiates an SDP
//! offer/answer exchange with the one other peer in the room and trickles
//! ICE candidates both ways.
//!
//! # Features
//!
//! - **Pure negotiation state machine**: `(state, input) -> actions`, testable without I/O
//! - **Caller/callee roles**: caller offers once the peer is ready, callee answers
//! - **Candidate queueing**: remote candidates that arrive early are applied in order
//! - **Pluggable seams**: `Transport` for signaling, `NegotiationEngine` for SDP
//! - **webrtc-rs engine**: `PeerConnection` with recvonly or sendrecv audio/video
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Relay (ws://host:port/ws?room=<id>)                 │
//! │  ↕ {"type": ..., "data": ...} text frames            │
//! │  SessionController (single select! loop)             │
//! │  ├─ SignalingChannel ── Transport (WebSocket)        │
//! │  ├─ NegotiationCoordinator (state machine)           │
//! │  └─ NegotiationEngine (webrtc-rs PeerConnection)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use clive_webrtc::{Role, SessionConfig};
//!
//! let config = SessionConfig {
//!     room: "lobby".to_string(),
//!     role: Role::Caller,
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.endpoint().url(), "ws://localhost:8080/ws?room=lobby");
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use clive_webrtc::{SessionConfig, SessionController};
//!
//! # async fn example() -> clive_webrtc::Result<()> {
//! let controller = SessionController::from_config(&SessionConfig::default()).await?;
//! let end = controller.run().await;
//! println!("session ended: {}", end);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod signaling;

pub use config::{MediaConfig, MediaDirection, SessionConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use negotiation::{Action, Input, NegotiationCoordinator, NegotiationState};
pub use peer::{
    EngineEvent, IceCandidate, IncomingTrack, MediaKind, NegotiationEngine, PeerConnection,
    SdpKind, SessionDescription,
};
pub use session::{Role, Session, SessionController, SessionEnd, SessionEndpoint};
pub use signaling::{
    DecodeError, SignalingChannel, SignalingEvent, SignalingMessage, Transport, TransportEvent,
    WebSocketTransport,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
