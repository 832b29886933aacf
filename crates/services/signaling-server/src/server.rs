//! WebSocket room relay
//!
//! Clients connect to `ws://<addr>/ws?room=<name>`. Text frames are relayed
//! verbatim to the other clients in the same room.

use crate::room::RoomRegistry;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        Message, Result as WsResult,
    },
};
use tracing::{debug, error, info, warn};

/// Path accepted for websocket upgrades
pub const WS_PATH: &str = "/ws";

/// Room used when the request carries no `room` parameter
pub const DEFAULT_ROOM: &str = "default";

/// Per-client outbound queue depth
const CLIENT_QUEUE: usize = 128;

/// Room relay bound to a TCP listener
pub struct SignalingServer {
    listener: TcpListener,
    rooms: RoomRegistry,
}

impl SignalingServer {
    /// Bind the listener
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            rooms: RoomRegistry::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle on the room table (for inspection)
    pub fn rooms(&self) -> RoomRegistry {
        self.rooms.clone()
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Open connections are closed on the same signal.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Signaling relay listening on ws://{}{}", addr, WS_PATH),
            Err(e) => warn!("Signaling relay listening on unknown address: {}", e),
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("Accepted connection from {}", peer_addr);
                            let rooms = self.rooms.clone();
                            let shutdown = shutdown.resubscribe();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, rooms, shutdown).await {
                                    warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Signaling relay received shutdown signal");
                    break;
                }
            }
        }

        info!("Signaling relay accept loop exited");
    }
}

/// Room named by the request's query string
fn room_from_query(query: Option<&str>) -> String {
    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "room")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|room| !room.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string())
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    rooms: RoomRegistry,
    mut shutdown: broadcast::Receiver<()>,
) -> WsResult<()> {
    let mut room = String::new();
    let ws_stream = accept_hdr_async(stream, |req: &Request, resp: Response| {
        if req.uri().path() != WS_PATH {
            let mut err = ErrorResponse::new(Some("not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            return Err(err);
        }
        room = room_from_query(req.uri().query());
        Ok(resp)
    })
    .await?;

    info!(room = %room, "WebSocket connection from {}", peer_addr);
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // The registry holds the only sender; dropping the client from the room
    // ends the forward task.
    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE);
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(msg)).await {
                debug!("Failed to send WebSocket message: {}", e);
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let id = rooms.join(&room, tx).await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => rooms.relay(&room, id, &text).await,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} closed the connection", peer_addr);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }

    // Cleanup on disconnect; dropping the sender lets the forward task close
    // the socket.
    rooms.leave(&room, id).await;
    let _ = forward_task.await;
    Ok(())
}
