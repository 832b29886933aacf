//! Negotiation engine interface
//!
//! The coordinator never touches a peer connection directly. It talks to a
//! [`NegotiationEngine`] and receives the engine's own events on a channel of
//! [`EngineEvent`]s. [`PeerConnection`] is the webrtc-rs backed engine.

pub mod connection;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use connection::PeerConnection;

/// Which half of an offer/answer exchange a description is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description as raw SDP text plus its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate as exchanged over signaling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate attribute line (`candidate:...`)
    pub candidate: String,

    /// Index of the media section the candidate belongs to
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: u32,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mline_index: u32) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mline_index,
        }
    }
}

/// Media kind of a negotiated track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Remote track announced by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingTrack {
    pub kind: MediaKind,
    pub track_id: String,
    pub stream_id: String,
    pub mime_type: String,
}

/// Events raised by the engine on its own schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Local session changed and a new offer is required
    NegotiationNeeded,
    /// A local ICE candidate was gathered
    IceCandidate(IceCandidate),
    /// The remote side started sending a track
    IncomingTrack(IncomingTrack),
    /// The peer connection failed and cannot recover
    Failed(String),
}

/// Offer/answer engine consumed by the session controller
///
/// Implementations report asynchronous events through the
/// `mpsc::UnboundedSender<EngineEvent>` they were built with.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Create an SDP offer (does not apply it)
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an SDP answer for the applied remote offer (does not apply it)
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()>;
}
