//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during backend operations.
///
/// Only [`StoreError::is_transient`] failures are worth retrying; the rest
/// fail the same way every time.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error from the Redis client.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Could not reach the backend.
    #[error("connection error: {0}")]
    Connection(String),

    /// A blocking worker task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(String),

    /// The in-memory backend's lock was poisoned by a panicking writer.
    #[error("backend lock poisoned")]
    LockPoisoned,

    /// A set operation hit a scalar key, or the reverse.
    #[error("wrong type for key {0}")]
    WrongType(String),

    /// The backend answered with a reply of the wrong shape.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for failures a repeated call may not hit again: lost
    /// connections, busy databases, cancelled workers.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(_) | StoreError::Connection(_) | StoreError::Blocking(_) => true,
            #[cfg(feature = "redis")]
            StoreError::Redis(_) => true,
            StoreError::LockPoisoned
            | StoreError::WrongType(_)
            | StoreError::UnexpectedReply(_)
            | StoreError::Migration(_)
            | StoreError::Io(_) => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
