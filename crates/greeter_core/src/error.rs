//! Error types for the registry core.

use crate::types::{TransactionId, View, WriterRole};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in registry operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] greeter_storage::StorageError),

    /// I/O error outside the storage backend (threads, directories).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A commit record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The commit log is damaged before its tail.
    #[error("commit log corrupted at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the damaged record.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// A registry entry was given an empty name.
    #[error("registry entry name must not be empty")]
    InvalidName,

    /// A put used a key that differs from the entry's own name.
    #[error("key '{key}' does not match entry name '{entry_name}'")]
    KeyMismatch {
        /// Key passed to the put.
        key: String,
        /// Name carried by the entry.
        entry_name: String,
    },

    /// The pipeline's role may not write this view.
    #[error("{role} pipeline may not write the {view} view")]
    ViewNotWritable {
        /// The view that was targeted.
        view: View,
        /// The role of the writing pipeline.
        role: WriterRole,
    },

    /// A write targeted a view whose root was never created.
    #[error("registry root missing in the {view} view")]
    RootNotInitialized {
        /// The view without a root.
        view: View,
    },

    /// Creating the registry roots failed.
    #[error("registry root initialization failed: {reason}")]
    RootInitFailed {
        /// Why initialization failed.
        reason: String,
    },

    /// The store has been closed.
    #[error("registry store is closed")]
    StoreClosed,

    /// The transaction chain is broken and accepts no more work.
    #[error("transaction chain broken{}: {}", failed_at(.txid), .cause)]
    ChainBroken {
        /// Transaction whose failure broke the chain, if any.
        txid: Option<TransactionId>,
        /// The recorded cause.
        cause: String,
    },

    /// A single commit failed without breaking the chain.
    #[error("commit of {txid} failed: {source}")]
    CommitFailed {
        /// The failed transaction.
        txid: TransactionId,
        /// The underlying failure.
        #[source]
        source: Box<CoreError>,
    },

    /// The pipeline was closed and accepts no more work.
    #[error("transaction pipeline is closed")]
    PipelineClosed,

    /// The commit worker went away before reporting an outcome.
    #[error("commit of {txid} abandoned by the pipeline")]
    CommitAbandoned {
        /// The abandoned transaction.
        txid: TransactionId,
    },

    /// Waiting for a commit acknowledgement timed out.
    #[error("commit of {txid} not acknowledged within {waited:?}")]
    CommitTimeout {
        /// The transaction being waited on.
        txid: TransactionId,
        /// How long the caller waited.
        waited: Duration,
    },

    /// Another process holds the registry directory.
    #[error("registry directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates a root initialization error.
    pub fn root_init_failed(reason: impl Into<String>) -> Self {
        Self::RootInitFailed {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this failure leaves the transaction chain unusable.
    ///
    /// Anything else fails one transaction and lets the chain continue.
    #[must_use]
    pub fn is_chain_fatal(&self) -> bool {
        match self {
            Self::StoreClosed | Self::LogCorruption { .. } | Self::ChainBroken { .. } => true,
            Self::Storage(e) => e.is_fatal(),
            Self::CommitFailed { source, .. } => source.is_chain_fatal(),
            _ => false,
        }
    }

    /// Returns true for a broken chain.
    #[must_use]
    pub fn is_chain_broken(&self) -> bool {
        matches!(self, Self::ChainBroken { .. })
    }
}

fn failed_at(txid: &Option<TransactionId>) -> String {
    txid.map(|t| format!(" at {t}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_storage::StorageError;

    #[test]
    fn chain_fatal_classification() {
        assert!(CoreError::StoreClosed.is_chain_fatal());
        assert!(CoreError::log_corruption(12, "crc").is_chain_fatal());
        assert!(CoreError::from(StorageError::Closed).is_chain_fatal());
        assert!(!CoreError::from(StorageError::from(io::Error::new(
            io::ErrorKind::Other,
            "disk full"
        )))
        .is_chain_fatal());
        assert!(!CoreError::RootNotInitialized {
            view: View::Operational
        }
        .is_chain_fatal());
    }

    #[test]
    fn commit_failed_inherits_fatality() {
        let err = CoreError::CommitFailed {
            txid: TransactionId::new(4),
            source: Box::new(CoreError::StoreClosed),
        };
        assert!(err.is_chain_fatal());
        assert!(err.to_string().contains("txn:4"));
    }

    #[test]
    fn chain_broken_display() {
        let err = CoreError::ChainBroken {
            txid: Some(TransactionId::new(9)),
            cause: "registry store is closed".into(),
        };
        assert_eq!(
            err.to_string(),
            "transaction chain broken at txn:9: registry store is closed"
        );

        let err = CoreError::ChainBroken {
            txid: None,
            cause: "operator request".into(),
        };
        assert_eq!(err.to_string(), "transaction chain broken: operator request");
        assert!(err.is_chain_broken());
    }

    #[test]
    fn view_not_writable_names_role() {
        let err = CoreError::ViewNotWritable {
            view: View::Configuration,
            role: WriterRole::Resolver,
        };
        assert_eq!(
            err.to_string(),
            "resolver pipeline may not write the configuration view"
        );
    }
}
