//! Configuration types for a signaling session

use crate::session::{Role, SessionEndpoint};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a [`SessionController`](crate::SessionController)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Signaling server `host:port` (no scheme, no path)
    pub server: String,

    /// Room id shared with the remote peer
    pub room: String,

    /// Caller creates the offer, callee answers
    pub role: Role,

    /// STUN server URLs
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Media kinds and direction to negotiate
    pub media: MediaConfig,

    /// Signaling connect timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,

    /// Per-round negotiation timeout in seconds (default: 30, 0 disables)
    pub negotiation_timeout_secs: u64,
}

/// TURN server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Which media sections the engine offers or accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub audio: bool,
    pub video: bool,
    pub direction: MediaDirection,
}

/// Transceiver direction for every negotiated media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDirection {
    /// Receive remote media only
    RecvOnly,
    /// Send and receive
    SendRecv,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            direction: MediaDirection::RecvOnly,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: "localhost:8080".to_string(),
            room: "default-room".to_string(),
            role: Role::Callee,
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            media: MediaConfig::default(),
            connect_timeout_secs: 10,
            negotiation_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.room.trim().is_empty() {
            return Err(Error::InvalidConfig("room must not be empty".to_string()));
        }

        if self.server.trim().is_empty() {
            return Err(Error::InvalidConfig("server must not be empty".to_string()));
        }

        if self.server.contains("://") || self.server.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "server must be host:port without scheme or path, got {}",
                self.server
            )));
        }

        if !self.media.audio && !self.media.video {
            return Err(Error::InvalidConfig(
                "at least one of audio or video must be enabled".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN server URL must start with stun: or stuns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN server URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        Ok(())
    }

    /// Signaling endpoint for this session
    pub fn endpoint(&self) -> SessionEndpoint {
        SessionEndpoint::new(self.server.clone(), self.room.clone())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `None` when the negotiation timeout is disabled
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        (self.negotiation_timeout_secs > 0).then(|| Duration::from_secs(self.negotiation_timeout_secs))
    }
}
