//! Greeting resolution.

use crate::entry::RegistryEntry;
use crate::error::{CoreError, CoreResult};
use crate::transaction::TransactionPipeline;
use crate::types::{View, WriterRole};
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix of the greeting served when no override exists.
pub const DEFAULT_GREETING_PREFIX: &str = "Hello ";

/// The greeting served for `name` when no override exists.
#[must_use]
pub fn default_greeting(name: &str) -> String {
    format!("{DEFAULT_GREETING_PREFIX}{name}")
}

/// Resolves greetings and records what was served.
///
/// `resolve` may be called from any number of threads; the pipeline orders
/// the operational writes.
#[derive(Debug, Clone)]
pub struct GreetingResolver {
    pipeline: Arc<TransactionPipeline>,
}

impl GreetingResolver {
    /// Creates a resolver on a [`WriterRole::Resolver`] pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a pipeline of any other
    /// role.
    pub fn new(pipeline: Arc<TransactionPipeline>) -> CoreResult<Self> {
        if pipeline.role() != WriterRole::Resolver {
            return Err(CoreError::invalid_operation(format!(
                "greeting resolver needs a resolver pipeline, got {}",
                pipeline.role()
            )));
        }
        Ok(Self { pipeline })
    }

    /// Returns the pipeline this resolver writes through.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<TransactionPipeline> {
        &self.pipeline
    }

    /// Resolves the greeting for `name`.
    ///
    /// The configured override wins; otherwise the default greeting is
    /// served. The result is recorded in the operational view without
    /// waiting for the commit, so it may not be visible yet when this
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidName`] for an empty name
    /// - [`CoreError::ChainBroken`] if the pipeline's chain is broken
    /// - [`CoreError::PipelineClosed`] if the pipeline was closed
    pub fn resolve(&self, name: &str) -> CoreResult<String> {
        if name.is_empty() {
            return Err(CoreError::InvalidName);
        }

        let greeting = self.lookup(name)?;
        self.record(name, &greeting);
        Ok(greeting)
    }

    fn lookup(&self, name: &str) -> CoreResult<String> {
        let read = self.pipeline.new_read_transaction()?;
        match read.read(View::Configuration, name) {
            Ok(Some(entry)) => {
                debug!(name, "serving configured greeting");
                Ok(entry.into_parts().1)
            }
            Ok(None) => Ok(default_greeting(name)),
            Err(e) => {
                warn!(name, error = %e, "configuration read failed, serving default greeting");
                Ok(default_greeting(name))
            }
        }
    }

    fn record(&self, name: &str, greeting: &str) {
        let submitted = RegistryEntry::new(name, greeting).and_then(|entry| {
            let mut txn = self.pipeline.new_write_transaction()?;
            txn.put(View::Operational, name, entry)?;
            self.pipeline.submit(txn)
        });
        match submitted {
            Ok(pending) => debug!(name, txid = %pending.txid(), "served greeting queued"),
            Err(e) => warn!(name, error = %e, "could not record served greeting"),
        }
    }
}
