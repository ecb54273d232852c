//! Error types for queries, repos and subscriptions.

use thiserror::Error;

/// Main error type for livesync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("405 Method Not Allowed")]
    MethodNotAllowed,

    /// Carries the full client-facing message, e.g. "403 Forbidden Delete Not By Name".
    #[error("{0}")]
    Forbidden(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

impl SyncError {
    /// HTTP-style status code surfaced in direct responses.
    pub fn status(&self) -> u16 {
        match self {
            SyncError::InvalidInput(_) => 400,
            SyncError::Forbidden(_) => 403,
            SyncError::MethodNotAllowed => 405,
            SyncError::ConnectionClosed => 410,
            SyncError::Io(_)
            | SyncError::Storage(_)
            | SyncError::UnknownRelation(_)
            | SyncError::Serialization(_) => 500,
        }
    }

    /// True for errors caused by the client rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for livesync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
