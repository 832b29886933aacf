//! Room relay signaling server for clive sessions
//!
//! Peers that join the same room over `ws://<addr>/ws?room=<name>` see each
//! other's text frames; the relay never inspects them beyond forwarding.
//! When a second client arrives every member receives `peer-ready`, which is
//! what starts the caller's offer.
//!
//! ```no_run
//! use clive_signaling_server::SignalingServer;
//!
//! # async fn run() -> std::io::Result<()> {
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let server = SignalingServer::bind("0.0.0.0:8080").await?;
//! tokio::spawn(server.run(shutdown_rx));
//! // ...
//! let _ = shutdown_tx.send(());
//! # Ok(())
//! # }
//! ```

pub mod room;
pub mod server;

pub use room::{ClientId, RoomRegistry};
pub use server::{SignalingServer, DEFAULT_ROOM, WS_PATH};
