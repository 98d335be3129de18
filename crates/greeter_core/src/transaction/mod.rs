//! Ordered transaction pipeline.
//!
//! A [`TransactionPipeline`] serializes the transactions of one logical
//! writer. Reads run synchronously against a snapshot; writes are buffered
//! in a [`WriteTransaction`] and handed to the pipeline's commit worker,
//! which applies them strictly in submission order.

mod listener;
mod pipeline;
mod state;

pub use listener::{ChainFailure, ChainListener, LoggingChainListener};
pub use pipeline::{PendingCommit, TransactionPipeline};
pub use state::{ReadTransaction, WriteOp, WriteTransaction};
