//! Room keys and persisted history access.

use std::sync::Arc;

use serde::Deserialize;

use super::errors::ChatError;
use super::models::ChatMessage;
use crate::kernel::BaseMessageStore;

/// Upper bound on one history page
pub const MAX_HISTORY_LIMIT: i64 = 100;

const MAX_ROOM_KEY_CHARS: usize = 100;

/// Room key for a school's chat room
pub fn room_key_for_school(school_id: i64) -> String {
    format!("school_{}", school_id)
}

/// Reject keys that are empty, too long, or contain whitespace/control chars.
pub fn validate_room_key(room: &str) -> Result<&str, ChatError> {
    if room.is_empty() || room.chars().count() > MAX_ROOM_KEY_CHARS {
        return Err(ChatError::InvalidRoom(room.to_string()));
    }
    if room.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ChatError::InvalidRoom(room.to_string()));
    }
    Ok(room)
}

/// `?limit=&offset=` query for history pages
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryQuery {
    /// Resolve to (limit, offset). Limit defaults to and is capped at `max`.
    pub fn resolve(&self, max: i64) -> (i64, i64) {
        let max = max.clamp(1, MAX_HISTORY_LIMIT);
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(max).min(max);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Read and cleanup access to a room's stored messages
#[derive(Clone)]
pub struct ChatHistory {
    store: Arc<dyn BaseMessageStore>,
    max_limit: i64,
}

impl ChatHistory {
    pub fn new(store: Arc<dyn BaseMessageStore>, max_limit: i64) -> Self {
        Self { store, max_limit }
    }

    /// One page of history, oldest first
    pub async fn page(
        &self,
        room: &str,
        query: HistoryQuery,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let room = validate_room_key(room)?;
        let (limit, offset) = query.resolve(self.max_limit);
        Ok(self.store.list_history(room, limit, offset).await?)
    }

    /// Delete a room's history, or only one sender's messages when given.
    pub async fn clear(&self, room: &str, sender: Option<&str>) -> Result<u64, ChatError> {
        let room = validate_room_key(room)?;
        let deleted = match sender {
            Some(sender) => self.store.delete_by_sender(room, sender).await?,
            None => self.store.delete_all(room).await?,
        };
        tracing::info!(room, sender, deleted, "Chat history cleared");
        Ok(deleted)
    }
}
