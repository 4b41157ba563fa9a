//! Error types for permrepo core.

use thiserror::Error;

use crate::kind::ResourceKind;

/// Core errors raised while building or validating permission sets.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid principal id: {0}")]
    InvalidPrincipal(String),

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
}

/// Errors from encoding or decoding a stored blob.
///
/// Every variant means the bytes in the backend cannot be trusted; callers
/// should alert rather than retry.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("blob truncated: {0} bytes is shorter than the length prefix")]
    Truncated(usize),

    #[error("blob length {0} exceeds the maximum of {max}", max = crate::codec::MAX_BLOB_LEN)]
    TooLarge(usize),

    #[error("decompressed length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("malformed stored value: {0}")]
    Malformed(String),

    #[error("resource kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
