use thiserror::Error;

/// Result type for sync engine operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync engine operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Room not found: {id}")]
    RoomNotFound { id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
