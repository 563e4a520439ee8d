//! Per-connection chat state machine.
//!
//! A connection moves `Connecting -> Joined -> Closed`. While joined, each
//! inbound text frame is parsed, persisted (unless it is a system notice) and
//! fanned out to the room. Persistence is awaited inside the originating
//! connection's task only, so a slow store never blocks other rooms.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use super::envelope::{ChatEnvelope, InboundMessage, ANONYMOUS_USERNAME, SYSTEM_SENDER};
use super::errors::ChatError;
use super::history::validate_room_key;
use super::registry::{ConnectionHandle, ConnectionId, RoomRegistry, DEFAULT_OUTBOUND_CAPACITY};
use crate::kernel::BaseMessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined,
    Closed,
}

/// Transport-neutral inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close,
}

#[derive(Clone)]
pub struct ChatDispatcher {
    registry: RoomRegistry,
    store: Arc<dyn BaseMessageStore>,
    outbound_capacity: usize,
}

impl ChatDispatcher {
    pub fn new(registry: RoomRegistry, store: Arc<dyn BaseMessageStore>) -> Self {
        Self {
            registry,
            store,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Register a new connection in `room`.
    ///
    /// Returns the joined connection and the receiver its writer drains.
    pub async fn connect(
        &self,
        room: &str,
        username: Option<String>,
    ) -> Result<(ChatConnection, mpsc::Receiver<ChatEnvelope>), ChatError> {
        let room = validate_room_key(room)?.to_string();
        let username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| ANONYMOUS_USERNAME.to_string());

        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let handle = ConnectionHandle::new(username, tx);

        let mut connection = ChatConnection {
            handle,
            room,
            state: ConnectionState::Connecting,
            registry: self.registry.clone(),
            store: self.store.clone(),
        };
        connection.join().await;

        Ok((connection, rx))
    }

    /// Drive one client until its inbound stream ends or it sends a close.
    ///
    /// Outbound envelopes are serialized to JSON and written by a separate
    /// task so a slow client only backs up its own queue.
    pub async fn serve<I, O>(
        &self,
        room: &str,
        username: Option<String>,
        inbound: I,
        outbound: O,
    ) -> Result<(), ChatError>
    where
        I: Stream<Item = InboundFrame>,
        O: Sink<String> + Send + 'static,
        O::Error: Display,
    {
        let (mut connection, mut rx) = self.connect(room, username).await?;
        let connection_id = connection.id();

        let writer = tokio::spawn(async move {
            let mut outbound = std::pin::pin!(outbound);
            while let Some(envelope) = rx.recv().await {
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize chat envelope");
                        continue;
                    }
                };
                if let Err(e) = outbound.send(text).await {
                    tracing::debug!(
                        connection = %connection_id,
                        error = %e,
                        "Chat socket write failed"
                    );
                    break;
                }
            }
        });

        let mut inbound = std::pin::pin!(inbound);
        while let Some(frame) = inbound.next().await {
            match frame {
                InboundFrame::Text(text) => {
                    // Failures are reported to the originator inside handle_frame
                    let _ = connection.handle_frame(&text).await;
                }
                InboundFrame::Close => break,
            }
        }

        connection.close().await;
        drop(connection);

        if let Err(e) = writer.await {
            tracing::warn!(connection = %connection_id, error = %e, "Chat writer task failed");
        }
        Ok(())
    }
}

/// One client's membership in one room
pub struct ChatConnection {
    handle: ConnectionHandle,
    room: String,
    state: ConnectionState,
    registry: RoomRegistry,
    store: Arc<dyn BaseMessageStore>,
}

impl ChatConnection {
    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn username(&self) -> &str {
        &self.handle.username
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    async fn join(&mut self) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.registry.join(&self.room, self.handle.clone()).await;
        self.state = ConnectionState::Joined;
        tracing::info!(
            room = %self.room,
            username = %self.handle.username,
            connection = %self.handle.id,
            "Chat connection joined"
        );
    }

    /// Process one inbound text frame.
    ///
    /// On failure the originator alone receives a processing-failed notice.
    pub async fn handle_frame(&mut self, text: &str) -> Result<ChatEnvelope, ChatError> {
        match self.dispatch(text).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                tracing::warn!(
                    room = %self.room,
                    connection = %self.handle.id,
                    error = %e,
                    "Chat frame rejected"
                );
                let _ = self.handle.deliver(ChatEnvelope::processing_failed());
                Err(e)
            }
        }
    }

    async fn dispatch(&self, text: &str) -> Result<ChatEnvelope, ChatError> {
        if self.state != ConnectionState::Joined {
            return Err(ChatError::NotJoined);
        }

        let inbound: InboundMessage = serde_json::from_str(text)?;
        let sender = inbound
            .sender
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.handle.username.clone());
        let timestamp = Utc::now();

        let id = if sender == SYSTEM_SENDER {
            None
        } else {
            match self
                .store
                .append(&self.room, &sender, &inbound.message, timestamp)
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(
                        room = %self.room,
                        sender = %sender,
                        error = %e,
                        "Failed to persist chat message"
                    );
                    None
                }
            }
        };

        let envelope = ChatEnvelope::chat(inbound.message, sender, timestamp, id);
        let delivered = self.registry.broadcast(&self.room, &envelope, None).await;
        tracing::debug!(room = %self.room, delivered, "Chat message broadcast");

        Ok(envelope)
    }

    /// Announce departure to the rest of the room, then deregister.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.state == ConnectionState::Joined {
            let notice = ChatEnvelope::departure(&self.handle.username);
            self.registry
                .broadcast(&self.room, &notice, Some(self.handle.id))
                .await;
            self.registry.leave(&self.room, self.handle.id).await;
        }
        self.state = ConnectionState::Closed;
        tracing::info!(
            room = %self.room,
            username = %self.handle.username,
            connection = %self.handle.id,
            "Chat connection closed"
        );
    }
}
