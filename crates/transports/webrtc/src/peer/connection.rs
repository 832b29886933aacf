//! webrtc-rs backed negotiation engine

use super::{
    EngineEvent, IceCandidate, IncomingTrack, MediaKind, NegotiationEngine, SdpKind,
    SessionDescription,
};
use crate::config::{MediaDirection, SessionConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// WebRTC peer connection wrapper
///
/// Owns a `webrtc::RTCPeerConnection` with one transceiver per configured
/// media kind and forwards its callbacks as [`EngineEvent`]s.
pub struct PeerConnection {
    /// Unique identifier for this connection instance
    connection_id: String,

    peer_connection: Arc<RTCPeerConnection>,
}

impl PeerConnection {
    /// Create a new peer connection
    ///
    /// # Arguments
    ///
    /// * `config` - STUN/TURN servers and media kinds to negotiate
    /// * `events` - Sink for negotiation-needed, candidate, track and failure events
    #[instrument(skip_all)]
    pub async fn new(
        config: &SessionConfig,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();

        info!(connection_id = %connection_id, "Creating peer connection");

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtc(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtc(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers(config),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(
            |e| Error::WebRtc(format!("Failed to create peer connection: {}", e)),
        )?);

        let direction = match config.media.direction {
            MediaDirection::RecvOnly => RTCRtpTransceiverDirection::Recvonly,
            MediaDirection::SendRecv => RTCRtpTransceiverDirection::Sendrecv,
        };

        for (enabled, kind) in [
            (config.media.audio, RTPCodecType::Audio),
            (config.media.video, RTPCodecType::Video),
        ] {
            if !enabled {
                continue;
            }
            peer_connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| {
                    Error::WebRtc(format!("Failed to add {} transceiver: {}", kind, e))
                })?;
        }

        install_handlers(&peer_connection, events);

        Ok(Self {
            connection_id,
            peer_connection,
        })
    }

    /// Get the connection ID
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Access the underlying webrtc-rs connection (media attach)
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

fn ice_servers(config: &SessionConfig) -> Vec<RTCIceServer> {
    config
        .stun_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .chain(config.turn_servers.iter().map(|turn| RTCIceServer {
            urls: vec![turn.url.clone()],
            username: turn.username.clone(),
            credential: turn.credential.clone(),
            ..Default::default()
        }))
        .collect()
}

fn install_handlers(pc: &Arc<RTCPeerConnection>, events: mpsc::UnboundedSender<EngineEvent>) {
    // The first offer waits for the relay's peer-ready; only changes after a
    // completed exchange are reported.
    let tx = events.clone();
    let weak = Arc::downgrade(pc);
    pc.on_negotiation_needed(Box::new(move || {
        let tx = tx.clone();
        let weak = weak.clone();
        Box::pin(async move {
            let Some(pc) = weak.upgrade() else {
                return;
            };
            if pc.remote_description().await.is_none() {
                debug!("Negotiation needed before first exchange, ignoring");
                return;
            }
            debug!("Negotiation needed");
            let _ = tx.send(EngineEvent::NegotiationNeeded);
        })
    }));

    let tx = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let tx = tx.clone();
        Box::pin(async move {
            // None marks the end of gathering
            let Some(candidate) = candidate else {
                debug!("ICE gathering complete");
                return;
            };
            match candidate.to_json() {
                Ok(init) => {
                    let _ = tx.send(EngineEvent::IceCandidate(IceCandidate::new(
                        init.candidate,
                        u32::from(init.sdp_mline_index.unwrap_or(0)),
                    )));
                }
                Err(e) => warn!("Failed to serialize local ICE candidate: {}", e),
            }
        })
    }));

    let tx = events.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let tx = tx.clone();
        Box::pin(async move {
            let kind = match track.kind() {
                RTPCodecType::Audio => MediaKind::Audio,
                RTPCodecType::Video => MediaKind::Video,
                other => {
                    warn!("Ignoring remote track of kind {}", other);
                    return;
                }
            };

            let incoming = IncomingTrack {
                kind,
                track_id: track.id(),
                stream_id: track.stream_id(),
                mime_type: track.codec().capability.mime_type,
            };
            info!(
                kind = %incoming.kind,
                track_id = %incoming.track_id,
                mime_type = %incoming.mime_type,
                "Remote track started"
            );
            let _ = tx.send(EngineEvent::IncomingTrack(incoming));

            // Drain RTP so the receiver keeps reporting; rendering happens downstream.
            // Spawned so the on_track handler returns before the next track arrives.
            tokio::spawn(async move {
                let mut packets = 0u64;
                while track.read_rtp().await.is_ok() {
                    packets += 1;
                }
                debug!(kind = %kind, packets, "Remote track ended");
            });
        })
    }));

    let tx = events;
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let tx = tx.clone();
        Box::pin(async move {
            debug!("Peer connection state: {}", state);
            if state == RTCPeerConnectionState::Failed {
                let _ = tx.send(EngineEvent::Failed(
                    "peer connection entered failed state".to_string(),
                ));
            }
        })
    }));
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| Error::Negotiation(format!("Failed to parse {:?} SDP: {}", desc.kind, e)))
}

#[async_trait]
impl NegotiationEngine for PeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create offer: {}", e)))?;

        debug!(connection_id = %self.connection_id, "Created SDP offer");
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create answer: {}", e)))?;

        debug!(connection_id = %self.connection_id, "Created SDP answer");
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        debug!(candidate = %candidate.candidate, "Adding remote ICE candidate");

        let sdp_mline_index = u16::try_from(candidate.sdp_mline_index).map_err(|_| {
            Error::WebRtc(format!(
                "sdpMLineIndex {} out of range",
                candidate.sdp_mline_index
            ))
        })?;

        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: None,
                sdp_mline_index: Some(sdp_mline_index),
                username_fragment: None,
            })
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        info!(connection_id = %self.connection_id, "Closing peer connection");
        self.peer_connection.close().await?;
        Ok(())
    }
}
