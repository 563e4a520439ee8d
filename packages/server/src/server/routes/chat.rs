//! Chat endpoints.
//!
//! GET /ws/chat/:room?username=NAME     WebSocket upgrade
//! GET /api/chat/:room/history          Stored history, oldest first
//!
//! The socket handler only adapts axum frames to the dispatcher's
//! transport-neutral stream/sink; all chat behavior lives in the dispatcher.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query,
    },
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::domains::chat::history::validate_room_key;
use crate::domains::chat::models::ChatMessage;
use crate::domains::chat::{ChatDispatcher, HistoryQuery, InboundFrame};
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ChatSocketQuery {
    username: Option<String>,
}

pub async fn chat_socket_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AxumAppState>,
    Path(room): Path<String>,
    Query(query): Query<ChatSocketQuery>,
) -> Result<Response, ApiError> {
    validate_room_key(&room)?;
    let dispatcher = state.deps.chat.clone();

    Ok(ws.on_upgrade(move |socket| run_socket(socket, dispatcher, room, query.username)))
}

async fn run_socket(
    socket: WebSocket,
    dispatcher: ChatDispatcher,
    room: String,
    username: Option<String>,
) {
    let (sink, stream) = socket.split();

    let outbound =
        sink.with(|text: String| async move { Ok::<_, axum::Error>(Message::Text(text)) });
    let inbound = stream.filter_map(|frame| async move {
        match frame {
            Ok(Message::Text(text)) => Some(InboundFrame::Text(text)),
            Ok(Message::Close(_)) => Some(InboundFrame::Close),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Chat socket read failed");
                Some(InboundFrame::Close)
            }
        }
    });

    if let Err(e) = dispatcher.serve(&room, username, inbound, outbound).await {
        tracing::warn!(room = %room, error = %e, "Chat connection ended with error");
    }
}

/// History entry as returned to clients
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for HistoryEntry {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            sender: m.sender,
            content: m.content,
            timestamp: m.timestamp,
        }
    }
}

pub async fn chat_history_handler(
    Extension(state): Extension<AxumAppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let messages = state.deps.chat_history.page(&room, query).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
