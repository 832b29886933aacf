//! Session aggregate and controller
//!
//! A [`Session`] is the single owned value describing one signaling session:
//! its role, its endpoint, an id used for log correlation and the
//! negotiation coordinator. The [`SessionController`] drives it.

pub mod controller;

use crate::negotiation::{NegotiationCoordinator, NegotiationState};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use controller::SessionController;

/// Role of the local peer, fixed for the whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates the offer once the remote peer is ready
    Caller,
    /// Waits for a remote offer and answers it
    Callee,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caller => f.write_str("caller"),
            Role::Callee => f.write_str("callee"),
        }
    }
}

/// Signaling server address and room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    server: String,
    room: String,
}

impl SessionEndpoint {
    pub fn new(server: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            room: room.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// `ws://<server>/ws?room=<room>` with the room id query-encoded
    pub fn url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("room", &self.room)
            .finish();
        format!("ws://{}/ws?{}", self.server, query)
    }
}

impl fmt::Display for SessionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The signaling connection closed
    TransportClosed,
    /// The signaling connection failed or could not be established
    TransportError(String),
    /// Offer/answer exchange could not complete
    NegotiationFailed(String),
    /// Local shutdown request
    Shutdown,
}

impl SessionEnd {
    /// Whether the process should report success
    pub fn is_clean(&self) -> bool {
        matches!(self, SessionEnd::TransportClosed | SessionEnd::Shutdown)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::TransportClosed => f.write_str("signaling connection closed"),
            SessionEnd::TransportError(reason) => write!(f, "signaling transport error: {}", reason),
            SessionEnd::NegotiationFailed(reason) => write!(f, "negotiation failed: {}", reason),
            SessionEnd::Shutdown => f.write_str("shutdown requested"),
        }
    }
}

/// One signaling session
#[derive(Debug)]
pub struct Session {
    id: String,
    role: Role,
    endpoint: SessionEndpoint,
    coordinator: NegotiationCoordinator,
}

impl Session {
    pub fn new(role: Role, endpoint: SessionEndpoint) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            endpoint,
            coordinator: NegotiationCoordinator::new(role),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn endpoint(&self) -> &SessionEndpoint {
        &self.endpoint
    }

    pub fn state(&self) -> NegotiationState {
        self.coordinator.state()
    }

    pub fn coordinator(&self) -> &NegotiationCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut NegotiationCoordinator {
        &mut self.coordinator
    }
}
