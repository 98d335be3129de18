//! # Greeter Core
//!
//! The registry behind the greeting service.
//!
//! This crate provides:
//! - A two-view registry store (configuration overrides, operational record)
//!   with snapshot reads and a durable commit log
//! - An ordered transaction pipeline: one commit worker per chain, commits in
//!   submission order, fail-fast once the chain is broken
//! - A commit outcome feed for fire-and-forget writes
//! - The greeting resolver and the administrative boundary
//!
//! ```rust
//! use greeter_core::{
//!     CommitFeed, GreetingResolver, LoggingChainListener, RegistryStore,
//!     TransactionPipeline, WriterRole,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(RegistryStore::in_memory().unwrap());
//! store.initialize_root().unwrap();
//!
//! let pipeline = TransactionPipeline::new(
//!     Arc::clone(&store),
//!     WriterRole::Resolver,
//!     Arc::new(LoggingChainListener),
//!     Arc::new(CommitFeed::new()),
//! )
//! .unwrap();
//! let resolver = GreetingResolver::new(Arc::new(pipeline)).unwrap();
//! assert_eq!(resolver.resolve("Ada").unwrap(), "Hello Ada");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod admin;
mod config;
#[cfg(feature = "std")]
mod dir;
mod entry;
mod error;
mod feed;
mod log;
mod registry;
mod resolver;
mod transaction;
mod types;

pub use admin::RegistryAdmin;
pub use config::{RegistryConfig, RootInitPolicy};
#[cfg(feature = "std")]
pub use dir::RegistryDir;
pub use entry::RegistryEntry;
pub use error::{CoreError, CoreResult};
pub use feed::{CommitFeed, CommitOutcome, CommitStatus};
pub use log::{CommitRecord, LogOp};
pub use registry::RegistryStore;
pub use resolver::{default_greeting, GreetingResolver, DEFAULT_GREETING_PREFIX};
pub use transaction::{
    ChainFailure, ChainListener, LoggingChainListener, PendingCommit, ReadTransaction,
    TransactionPipeline, WriteOp, WriteTransaction,
};
pub use types::{SequenceNumber, TransactionId, View, WriterRole};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
