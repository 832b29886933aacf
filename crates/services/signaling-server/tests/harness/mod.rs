//! Relay test harness
//!
//! - `Relay`: a live server on an ephemeral loopback port
//! - `WsClient`: a bare websocket client for frame-level assertions
//! - `ScriptedEngine`: negotiation engine that answers with canned SDP

#![allow(dead_code)]

pub mod scripted_engine;

use clive_signaling_server::{RoomRegistry, SignalingServer};
use clive_webrtc::{NegotiationState, SignalingMessage};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub use scripted_engine::ScriptedEngine;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unexpected: {0}")]
    Unexpected(String),
}

pub const WAIT: Duration = Duration::from_secs(10);

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug,webrtc=warn,webrtc_ice=warn,webrtc_mdns=warn")
        .with_test_writer()
        .try_init();
}

/// Relay running in the background
pub struct Relay {
    pub addr: SocketAddr,
    pub rooms: RoomRegistry,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Relay {
    pub async fn start() -> HarnessResult<Self> {
        let server = SignalingServer::bind("127.0.0.1:0")
            .await
            .map_err(|e| HarnessError::Unexpected(format!("bind failed: {}", e)))?;
        let addr = server
            .local_addr()
            .map_err(|e| HarnessError::Unexpected(e.to_string()))?;
        let rooms = server.rooms();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.run(shutdown_rx));

        Ok(Self {
            addr,
            rooms,
            shutdown_tx,
            handle,
        })
    }

    /// `host:port` as a session config expects it
    pub fn server(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.addr, path_and_query)
    }

    /// Wait until `room` holds `size` clients
    pub async fn wait_room_size(&self, room: &str, size: usize) -> HarnessResult<()> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let current = self.rooms.room_size(room).await;
            if current == size {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!(
                    "room {} has {} clients, wanted {}",
                    room, current, size
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = tokio::time::timeout(WAIT, self.handle).await;
    }
}

/// Raw websocket client
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> HarnessResult<Self> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| HarnessError::Unexpected(format!("connect {} failed: {}", url, e)))?;
        Ok(Self { stream })
    }

    pub async fn send_text(&mut self, text: &str) -> HarnessResult<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| HarnessError::Unexpected(e.to_string()))
    }

    /// Next text frame
    pub async fn recv_text(&mut self) -> HarnessResult<String> {
        loop {
            let msg = tokio::time::timeout(WAIT, self.stream.next())
                .await
                .map_err(|_| HarnessError::Timeout("no frame received".to_string()))?;
            match msg {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(_))) | None => {
                    return Err(HarnessError::Unexpected("connection closed".to_string()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(HarnessError::Unexpected(e.to_string())),
            }
        }
    }

    pub async fn expect_peer_ready(&mut self) -> HarnessResult<()> {
        let text = self.recv_text().await?;
        match SignalingMessage::decode(&text) {
            Ok(SignalingMessage::PeerReady) => Ok(()),
            other => Err(HarnessError::Unexpected(format!(
                "expected peer-ready, got {:?}",
                other
            ))),
        }
    }

    /// Assert no text frame arrives within `wait`
    pub async fn expect_silence(&mut self, wait: Duration) -> HarnessResult<()> {
        match tokio::time::timeout(wait, self.stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                Err(HarnessError::Unexpected(format!("unexpected frame {}", text)))
            }
            _ => Ok(()),
        }
    }

    /// Wait for the server to close the connection
    pub async fn expect_closed(&mut self) -> HarnessResult<()> {
        loop {
            let msg = tokio::time::timeout(WAIT, self.stream.next())
                .await
                .map_err(|_| HarnessError::Timeout("connection still open".to_string()))?;
            match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Ok(()),
                Some(Ok(_)) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Wait until the observed state equals `expected`
pub async fn wait_for_state(
    rx: &mut watch::Receiver<NegotiationState>,
    expected: NegotiationState,
) -> HarnessResult<()> {
    let waited = tokio::time::timeout(WAIT, rx.wait_for(|state| *state == expected))
        .await
        .map(|result| result.is_ok());

    match waited {
        Ok(true) => Ok(()),
        Ok(false) => Err(HarnessError::Unexpected(format!(
            "controller ended before reaching {:?}",
            expected
        ))),
        Err(_) => Err(HarnessError::Timeout(format!(
            "state {:?} not reached, last {:?}",
            expected,
            *rx.borrow()
        ))),
    }
}
