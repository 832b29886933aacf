//! WebSocket transport over tokio-tungstenite

use super::transport::{Transport, TransportEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket signaling transport
pub struct WebSocketTransport {
    connect_timeout: Duration,

    /// Outgoing frame sender, set while connected
    tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,

    /// Event sink of the current connection
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,

    /// Set once the terminal event has been emitted
    closed: Arc<AtomicBool>,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            tx: Mutex::new(None),
            events: Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the websocket, bounded by the connect timeout
    async fn open(&self, url: &str) -> Result<WsStream> {
        match tokio::time::timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok((ws_stream, _response))) => Ok(ws_stream),
            Ok(Err(e)) => Err(Error::Transport(format!("Failed to connect to {}: {}", url, e))),
            Err(_) => Err(Error::Timeout(format!(
                "connect to {} after {:?}",
                url, self.connect_timeout
            ))),
        }
    }

    /// Sender task: sends frames from the channel to the socket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }

        debug!("Sender task terminated");
    }

    /// Receiver task: forwards text frames as events until the socket ends
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        events: mpsc::UnboundedSender<TransportEvent>,
        closed: Arc<AtomicBool>,
    ) {
        let mut failure = None;

        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    if closed.load(Ordering::SeqCst) || events.send(TransportEvent::Text(text)).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "WebSocket connection closed by server");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if !closed.swap(true, Ordering::SeqCst) {
            let _ = events.send(match failure {
                Some(reason) => TransportEvent::Error(reason),
                None => TransportEvent::Closed,
            });
        }

        debug!("Receiver task terminated");
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("Connecting to signaling server: {}", url);

        let ws_stream = match self.open(url).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                warn!("{}", e);
                let _ = events_tx.send(TransportEvent::Error(e.to_string()));
                return events_rx;
            }
        };

        info!("Connected to signaling server");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        self.closed.store(false, Ordering::SeqCst);
        *self.tx.lock() = Some(tx);
        *self.events.lock() = Some(events_tx.clone());

        // Open goes out before the receiver can emit anything
        let _ = events_tx.send(TransportEvent::Open);

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, events_tx, Arc::clone(&self.closed)));

        events_rx
    }

    fn send_text(&self, text: String) {
        match self.tx.lock().as_ref() {
            Some(tx) => {
                if tx.send(Message::Text(text)).is_err() {
                    debug!("Sender task gone, dropping outbound frame");
                }
            }
            None => debug!("Not connected, dropping outbound frame"),
        }
    }

    async fn close(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Message::Close(None));
        }

        let events = self.events.lock().take();
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(events) = events {
                let _ = events.send(TransportEvent::Closed);
            }
        }
    }
}
