//! Error types for the signaling client

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or driving a signaling session
///
/// Per-message problems (undecodable frames, protocol violations) never
/// surface here; they are logged and the message is dropped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling transport failure (connect failure, abrupt close)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Negotiation engine could not produce or apply a session description
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(String),
}

impl Error {
    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

impl From<webrtc::Error> for Error {
    fn from(err: webrtc::Error) -> Self {
        Error::WebRtc(err.to_string())
    }
}
