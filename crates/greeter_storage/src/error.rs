//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// Truncation target lies past the end of storage.
    #[error("cannot truncate to {requested} bytes, storage holds {size}")]
    TruncatePastEnd {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// The stored bytes are corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage is closed and accepts no more operations.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if the backend can no longer be trusted for any further
    /// operation, as opposed to a single failed call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Corrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_not_fatal() {
        let err = StorageError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn closed_and_corrupted_are_fatal() {
        assert!(StorageError::Closed.is_fatal());
        assert!(StorageError::Corrupted("bad tail".into()).is_fatal());
    }

    #[test]
    fn display_includes_bounds() {
        let err = StorageError::ReadPastEnd {
            offset: 10,
            len: 4,
            size: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 10"));
        assert!(msg.contains("size 12"));
    }
}
