//! Error types for the permission repository.

use std::time::Duration;

use permrepo_core::CodecError;
use permrepo_store::StoreError;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The operation did not finish before its deadline.
    #[error("{operation} timed out after {}ms", .limit.as_millis())]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    /// Backend error.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// A stored blob could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(#[from] CodecError),

    /// A permission set could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encoding(CodecError),

    /// The principal id is empty or does not match its record.
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    /// Some chunks of a bulk write failed. Principals not listed were written.
    #[error("bulk write failed for {} principal(s): {source}", .failed.len())]
    BulkWrite {
        failed: Vec<String>,
        source: Box<RepositoryError>,
    },
}

impl RepositoryError {
    pub fn is_timeout(&self) -> bool {
        match self {
            RepositoryError::Timeout { .. } => true,
            RepositoryError::BulkWrite { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    pub fn is_backend(&self) -> bool {
        match self {
            RepositoryError::Backend(_) => true,
            RepositoryError::BulkWrite { source, .. } => source.is_backend(),
            _ => false,
        }
    }

    pub fn is_decoding(&self) -> bool {
        matches!(self, RepositoryError::Decoding(_))
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
