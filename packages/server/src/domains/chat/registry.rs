//! In-process room registry for chat fan-out.
//!
//! Maps a room key to the connections currently joined to it. Each room has
//! its own lock, so traffic in one room never waits on membership changes in
//! another. Rooms exist only while they have members.
//!
//! # Usage
//!
//! Connection tasks:
//!   let rx = registry.join("school_5", handle).await;
//!
//! Producers:
//!   registry.broadcast("school_5", envelope, None).await;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::envelope::ChatEnvelope;

pub type ConnectionId = Uuid;

/// Per-connection outbound queue depth before messages are dropped for that
/// connection.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Registered member of a room.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub username: String,
    tx: mpsc::Sender<ChatEnvelope>,
}

impl ConnectionHandle {
    pub fn new(username: impl Into<String>, tx: mpsc::Sender<ChatEnvelope>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            tx,
        }
    }

    /// Queue an envelope without waiting.
    pub fn deliver(&self, envelope: ChatEnvelope) -> Result<(), DeliveryError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagged,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's queue is full; this message is dropped for it
    Lagged,
    /// The connection is gone
    Closed,
}

#[derive(Default)]
struct Room {
    members: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

/// Thread-safe, cloneable registry of chat rooms.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Arc<Room>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Joining again with the same id refreshes it.
    pub async fn join(&self, room: &str, handle: ConnectionHandle) {
        let mut rooms = self.rooms.write().await;
        let entry = rooms.entry(room.to_string()).or_default().clone();
        let mut members = entry.members.write().await;
        members.insert(handle.id, handle);
    }

    /// Deregister a connection. Unknown ids are ignored.
    pub async fn leave(&self, room: &str, id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get(room).cloned() else {
            return;
        };
        let mut members = entry.members.write().await;
        members.remove(&id);
        if members.is_empty() {
            rooms.remove(room);
        }
    }

    /// Deliver to every member registered at call time, optionally skipping one.
    ///
    /// Members whose connection has closed are removed. Returns the number of
    /// members the envelope was queued for.
    pub async fn broadcast(
        &self,
        room: &str,
        envelope: &ChatEnvelope,
        excluding: Option<ConnectionId>,
    ) -> usize {
        let Some(entry) = self.rooms.read().await.get(room).cloned() else {
            return 0;
        };

        let snapshot: Vec<ConnectionHandle> = entry
            .members
            .read()
            .await
            .values()
            .filter(|h| Some(h.id) != excluding)
            .cloned()
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for handle in &snapshot {
            match handle.deliver(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Lagged) => {
                    tracing::warn!(
                        room,
                        connection = %handle.id,
                        "Outbound queue full, dropping message"
                    );
                }
                Err(DeliveryError::Closed) => closed.push(handle.id),
            }
        }

        for id in closed {
            tracing::debug!(room, connection = %id, "Removing closed connection");
            self.leave(room, id).await;
        }

        delivered
    }

    /// Usernames of current members
    pub async fn members(&self, room: &str) -> Vec<String> {
        let Some(entry) = self.rooms.read().await.get(room).cloned() else {
            return Vec::new();
        };
        let members = entry.members.read().await;
        members.values().map(|h| h.username.clone()).collect()
    }

    pub async fn member_count(&self, room: &str) -> usize {
        let Some(entry) = self.rooms.read().await.get(room).cloned() else {
            return 0;
        };
        let members = entry.members.read().await;
        members.len()
    }

    /// Rooms with at least one member
    pub async fn active_rooms(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> (ConnectionHandle, mpsc::Receiver<ChatEnvelope>) {
        let (tx, rx) = mpsc::channel(8);
        (ConnectionHandle::new(name, tx), rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = handle("a");
        let (b, mut rx_b) = handle("b");
        registry.join("room", a).await;
        registry.join("room", b).await;

        let envelope = ChatEnvelope::system("hello");
        assert_eq!(registry.broadcast("room", &envelope, None).await, 2);

        assert_eq!(rx_a.recv().await.unwrap(), envelope);
        assert_eq!(rx_b.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_broadcast_excluding_skips_one_member() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = handle("a");
        let (b, mut rx_b) = handle("b");
        let a_id = a.id;
        registry.join("room", a).await;
        registry.join("room", b).await;

        registry
            .broadcast("room", &ChatEnvelope::system("x"), Some(a_id))
            .await;

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = handle("a");
        let (b, mut rx_b) = handle("b");
        registry.join("x", a).await;
        registry.join("y", b).await;

        registry.broadcast("x", &ChatEnvelope::system("only x"), None).await;

        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_and_leave_are_idempotent() {
        let registry = RoomRegistry::new();
        let (a, _rx) = handle("a");
        let id = a.id;

        registry.join("room", a.clone()).await;
        registry.join("room", a).await;
        assert_eq!(registry.member_count("room").await, 1);

        registry.leave("room", id).await;
        registry.leave("room", id).await;
        registry.leave("missing", id).await;
        assert_eq!(registry.member_count("room").await, 0);
    }

    #[tokio::test]
    async fn test_empty_room_is_dropped() {
        let registry = RoomRegistry::new();
        let (a, _rx) = handle("a");
        let id = a.id;
        registry.join("room", a).await;
        assert_eq!(registry.active_rooms().await, vec!["room".to_string()]);

        registry.leave("room", id).await;

        assert!(registry.active_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_connection_is_removed_without_affecting_others() {
        let registry = RoomRegistry::new();
        let (a, rx_a) = handle("a");
        let (b, mut rx_b) = handle("b");
        registry.join("room", a).await;
        registry.join("room", b).await;
        drop(rx_a);

        let delivered = registry
            .broadcast("room", &ChatEnvelope::system("still here"), None)
            .await;

        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
        assert_eq!(registry.members("room").await, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_room_is_noop() {
        let registry = RoomRegistry::new();
        assert_eq!(
            registry.broadcast("nobody", &ChatEnvelope::system("x"), None).await,
            0
        );
    }
}
