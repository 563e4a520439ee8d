use thiserror::Error;

/// Errors raised while handling chat traffic
#[derive(Error, Debug)]
pub enum ChatError {
    /// Inbound frame was not a valid `{message, sender}` payload
    #[error("Malformed chat frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("Invalid room: {0}")]
    InvalidRoom(String),

    #[error("Connection is not joined to a room")]
    NotJoined,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
