use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// ChatMessage - persisted message in a room's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    /// Sequence id assigned by the store
    pub id: i64,
    pub room_name: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Message Queries
// =============================================================================

impl ChatMessage {
    /// Persist a message and return its sequence id
    pub async fn create(
        room_name: &str,
        sender: &str,
        content: &str,
        timestamp: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chat_messages (room_name, sender, content, timestamp)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(room_name)
        .bind(sender)
        .bind(content)
        .bind(timestamp)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    /// One page of history, returned oldest first.
    ///
    /// The query walks newest-first so `offset` 0 is the latest page; the page
    /// is reversed before returning.
    pub async fn find_page(
        room_name: &str,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM chat_messages
            WHERE room_name = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(room_name)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Delete a room's entire history
    pub async fn delete_for_room(room_name: &str, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE room_name = $1")
            .bind(room_name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete everything one sender wrote in a room
    pub async fn delete_by_sender(room_name: &str, sender: &str, pool: &PgPool) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM chat_messages WHERE room_name = $1 AND sender = $2")
                .bind(room_name)
                .bind(sender)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
