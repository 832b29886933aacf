//! Signaling wire protocol
//!
//! Every frame is a UTF-8 JSON envelope `{"type": <tag>, "data": <payload|null>}`:
//!
//! | type         | data                                              |
//! |--------------|---------------------------------------------------|
//! | `peer-ready` | `null` or absent                                  |
//! | `offer`      | `{"sdp": "<raw SDP>"}`                            |
//! | `answer`     | `{"sdp": "<raw SDP>"}`                            |
//! | `candidate`  | `{"candidate": "<ICE>", "sdpMLineIndex": <int>}`  |
//!
//! Decoding ignores unknown fields so peers that send the browser shapes
//! (`{"type":"offer","sdp":...}`, `sdpMid`, `usernameFragment`) interoperate.

use crate::peer::IceCandidate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PEER_READY: &str = "peer-ready";
pub const OFFER: &str = "offer";
pub const ANSWER: &str = "answer";
pub const CANDIDATE: &str = "candidate";

/// Signaling message exchanged with the remote peer through the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingMessage {
    /// Remote peer joined the room; a caller may start negotiating
    PeerReady,
    /// SDP offer
    Offer { sdp: String },
    /// SDP answer
    Answer { sdp: String },
    /// Trickled ICE candidate
    Candidate(IceCandidate),
}

/// Why an inbound frame was dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not a JSON object with a string `type`
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Envelope `type` is not part of the protocol
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Known `type` whose `data` lacks required fields
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: Value,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize, Deserialize)]
struct SdpPayload {
    sdp: String,
}

impl SignalingMessage {
    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::PeerReady => PEER_READY,
            SignalingMessage::Offer { .. } => OFFER,
            SignalingMessage::Answer { .. } => ANSWER,
            SignalingMessage::Candidate(_) => CANDIDATE,
        }
    }

    /// Serialize to a wire envelope
    pub fn encode(&self) -> String {
        let data = match self {
            SignalingMessage::PeerReady => Value::Null,
            SignalingMessage::Offer { sdp } | SignalingMessage::Answer { sdp } => {
                serde_json::json!({ "sdp": sdp })
            }
            SignalingMessage::Candidate(candidate) => serde_json::json!({
                "candidate": candidate.candidate,
                "sdpMLineIndex": candidate.sdp_mline_index,
            }),
        };

        let envelope = OutboundEnvelope {
            kind: self.kind(),
            data,
        };
        // Serializing a struct of a &str and a Value cannot fail.
        serde_json::to_string(&envelope).unwrap_or_default()
    }

    /// Parse a wire envelope
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: InboundEnvelope = serde_json::from_str(text)
            .map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))?;

        match envelope.kind.as_str() {
            PEER_READY => Ok(SignalingMessage::PeerReady),
            OFFER => {
                let payload: SdpPayload = payload(OFFER, envelope.data)?;
                Ok(SignalingMessage::Offer { sdp: payload.sdp })
            }
            ANSWER => {
                let payload: SdpPayload = payload(ANSWER, envelope.data)?;
                Ok(SignalingMessage::Answer { sdp: payload.sdp })
            }
            CANDIDATE => Ok(SignalingMessage::Candidate(payload(
                CANDIDATE,
                envelope.data,
            )?)),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: Value,
) -> Result<T, DecodeError> {
    if data.is_null() {
        return Err(DecodeError::MalformedPayload {
            kind,
            reason: "missing data".to_string(),
        });
    }
    serde_json::from_value(data).map_err(|e| DecodeError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Encode a message for the wire
pub fn encode(msg: &SignalingMessage) -> String {
    msg.encode()
}

/// Decode one inbound frame
pub fn decode(text: &str) -> Result<SignalingMessage, DecodeError> {
    SignalingMessage::decode(text)
}
