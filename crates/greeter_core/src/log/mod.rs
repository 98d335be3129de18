//! Durable commit log.
//!
//! Every committed write transaction becomes one framed record appended to
//! the storage backend. Reopening a registry replays the log to rebuild the
//! views.

mod record;
mod writer;

pub use record::{CommitRecord, LogOp};
pub(crate) use writer::CommitLog;
