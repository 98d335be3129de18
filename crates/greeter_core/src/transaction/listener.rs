//! Chain failure reporting.

use crate::error::CoreError;
use crate::types::{TransactionId, WriterRole};
use tracing::{error, info};

/// Why a transaction chain broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFailure {
    /// The transaction whose failure broke the chain, if one did.
    pub txid: Option<TransactionId>,
    /// Description of the failure.
    pub cause: String,
}

impl ChainFailure {
    /// The error handed to callers of a broken chain.
    #[must_use]
    pub fn to_error(&self) -> CoreError {
        CoreError::ChainBroken {
            txid: self.txid,
            cause: self.cause.clone(),
        }
    }
}

/// Receives chain lifecycle notifications.
///
/// Called from the pipeline's commit worker; implementations must not block.
pub trait ChainListener: Send + Sync {
    /// The chain broke. Called once per pipeline.
    fn on_chain_failure(&self, role: WriterRole, failure: &ChainFailure);

    /// The pipeline was closed without ever breaking.
    fn on_chain_success(&self, role: WriterRole) {
        let _ = role;
    }
}

/// Reports chain events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingChainListener;

impl ChainListener for LoggingChainListener {
    fn on_chain_failure(&self, role: WriterRole, failure: &ChainFailure) {
        match failure.txid {
            Some(txid) => error!(%role, %txid, cause = %failure.cause, "transaction chain failed"),
            None => error!(%role, cause = %failure.cause, "transaction chain failed"),
        }
    }

    fn on_chain_success(&self, role: WriterRole) {
        info!(%role, "transaction chain closed cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_converts_to_chain_broken() {
        let failure = ChainFailure {
            txid: Some(TransactionId::new(3)),
            cause: "registry store is closed".into(),
        };
        let err = failure.to_error();
        assert!(err.is_chain_broken());
        assert!(err.is_chain_fatal());
        assert!(err.to_string().contains("txn:3"));
    }
}
