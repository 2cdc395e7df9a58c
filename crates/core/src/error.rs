//! Error types for the HNSW index.
//!
//! Validation errors are raised before any graph mutation. Corruption errors abort a
//! load without producing an index. Panics raised by a caller-supplied distance
//! function are not caught; they unwind through the call that triggered them.

use std::io;
use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, HnswError>;

#[derive(Debug, Error)]
pub enum HnswError {
    /// Parameters rejected by [`HnswConfig::validate`](crate::hnsw::HnswConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Index dimension outside `1..=MAX_DIMENSION`.
    #[error("invalid dimension {0}")]
    InvalidDimension(usize),

    /// A vector whose length differs from the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A node id that does not exist in the graph.
    #[error("node {id} out of range (graph has {count} nodes)")]
    NodeOutOfRange { id: u32, count: usize },

    /// A previous `add_items` call was cancelled or aborted mid-batch.
    /// The graph is in an undefined state and must be rebuilt.
    #[error("index build did not complete; discard and rebuild")]
    IncompleteBuild,

    /// `add_items` on an index that was loaded from storage.
    #[error("index was loaded from storage and is read-only")]
    ReadOnly,

    /// `add_items` observed its cancellation token.
    #[error("index build cancelled")]
    Cancelled,

    /// Persisted graph is malformed.
    #[error("corrupt graph data: {0}")]
    Corruption(String),

    /// Persisted graph uses a format version this build cannot read.
    #[error("unsupported graph format version {0}")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HnswError {
    /// Maps read errors while decoding: a short read is corruption, anything else is I/O.
    pub(crate) fn from_read(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HnswError::Corruption("unexpected end of stream".to_string())
        } else {
            HnswError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_dimension_mismatch() {
        let err = HnswError::DimensionMismatch {
            expected: 16,
            actual: 3,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 16, got 3");
    }

    #[test]
    fn test_short_read_is_corruption() {
        let err = HnswError::from_read(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, HnswError::Corruption(_)));

        let err = HnswError::from_read(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(err, HnswError::Io(_)));
    }
}
