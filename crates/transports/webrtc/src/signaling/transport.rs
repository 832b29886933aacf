//! Text transport consumed by the signaling channel

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Raw transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established; always the first event on success
    Open,
    /// One inbound text frame
    Text(String),
    /// Connection closed; emitted at most once
    Closed,
    /// Connect failure or abrupt loss; emitted instead of `Closed`
    Error(String),
}

/// Connection that carries signaling text frames
///
/// Implementations deliver events in receipt order on the returned channel
/// and stop delivering after `Closed` or `Error`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`
    ///
    /// Failures are reported as the first event rather than as an error.
    async fn connect(&self, url: &str) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Queue a text frame; dropped when not connected
    fn send_text(&self, text: String);

    /// Close the connection; safe to call repeatedly
    async fn close(&self);
}
