//! Room membership and fan-out
//!
//! Each connected client owns a bounded outbound queue; the registry holds the
//! sending half keyed by room and client id.

use clive_webrtc::SignalingMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Identifier assigned to each connection on join
pub type ClientId = u64;

/// Shared room table
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, HashMap<ClientId, mpsc::Sender<String>>>>>,
    next_id: Arc<AtomicU64>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to `room`.
    ///
    /// When the room already had members, every member (the newcomer
    /// included) is told a peer is ready.
    pub async fn join(&self, room: &str, tx: mpsc::Sender<String>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room.to_string()).or_default();
        members.insert(id, tx);
        info!(room = %room, client = id, members = members.len(), "Client joined room");

        if members.len() > 1 {
            let ready = SignalingMessage::PeerReady.encode();
            let dropped = fan_out(members, None, &ready);
            prune(&mut rooms, room, &dropped);
        }

        id
    }

    /// Forward `text` to every member of `room` except `from`
    pub async fn relay(&self, room: &str, from: ClientId, text: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get(room) else {
            return;
        };
        if !members.contains_key(&from) {
            debug!(room = %room, client = from, "Sender no longer in room, dropping frame");
            return;
        }
        debug!(room = %room, client = from, len = text.len(), "Relaying frame");

        let dropped = fan_out(members, Some(from), text);
        prune(&mut rooms, room, &dropped);
    }

    /// Remove a client; the room goes away with its last member
    pub async fn leave(&self, room: &str, id: ClientId) {
        let mut rooms = self.rooms.write().await;
        prune(&mut rooms, room, &[id]);
        info!(room = %room, client = id, "Client left room");
    }

    /// Number of clients currently in `room`
    pub async fn room_size(&self, room: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of non-empty rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// Queue `text` on every member but `skip`; returns members whose queue is
/// closed or full.
fn fan_out(
    members: &HashMap<ClientId, mpsc::Sender<String>>,
    skip: Option<ClientId>,
    text: &str,
) -> Vec<ClientId> {
    let mut dropped = Vec::new();
    for (id, tx) in members {
        if Some(*id) == skip {
            continue;
        }
        if let Err(e) = tx.try_send(text.to_string()) {
            warn!(client = id, error = %e, "Dropping client from room");
            dropped.push(*id);
        }
    }
    dropped
}

fn prune(
    rooms: &mut HashMap<String, HashMap<ClientId, mpsc::Sender<String>>>,
    room: &str,
    ids: &[ClientId],
) {
    if let Some(members) = rooms.get_mut(room) {
        for id in ids {
            members.remove(id);
        }
        if members.is_empty() {
            rooms.remove(room);
            debug!(room = %room, "Room removed");
        }
    }
}
