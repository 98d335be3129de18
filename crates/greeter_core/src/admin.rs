//! Administrative boundary.

use crate::entry::RegistryEntry;
use crate::error::{CoreError, CoreResult};
use crate::transaction::TransactionPipeline;
use crate::types::{SequenceNumber, View, WriterRole};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Operator access to the registry.
///
/// Writes go to the configuration view and are acknowledged before the call
/// returns. Reads cover both views.
#[derive(Debug, Clone)]
pub struct RegistryAdmin {
    pipeline: Arc<TransactionPipeline>,
    commit_timeout: Duration,
}

impl RegistryAdmin {
    /// Creates an admin handle on a [`WriterRole::Administrator`] pipeline.
    pub fn new(pipeline: Arc<TransactionPipeline>, commit_timeout: Duration) -> CoreResult<Self> {
        if pipeline.role() != WriterRole::Administrator {
            return Err(CoreError::invalid_operation(format!(
                "registry admin needs an administrator pipeline, got {}",
                pipeline.role()
            )));
        }
        Ok(Self {
            pipeline,
            commit_timeout,
        })
    }

    /// Returns the pipeline used for writes.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<TransactionPipeline> {
        &self.pipeline
    }

    /// Programs `greeting` as the override for `name` and waits for the
    /// commit.
    ///
    /// Programming the greeting already configured succeeds without writing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitTimeout`] if the commit is not
    /// acknowledged within the commit timeout, or the commit error.
    pub fn program_greeting(&self, name: &str, greeting: &str) -> CoreResult<SequenceNumber> {
        let entry = RegistryEntry::new(name, greeting)?;
        let mut txn = self.pipeline.new_write_transaction()?;
        txn.put(View::Configuration, name, entry)?;
        let seq = self.pipeline.submit(txn)?.wait_timeout(self.commit_timeout)?;
        info!(name, seq = seq.as_u64(), "greeting override programmed");
        Ok(seq)
    }

    /// The greeting last served for `name`.
    pub fn served_greeting(&self, name: &str) -> CoreResult<Option<String>> {
        self.greeting_in(View::Operational, name)
    }

    /// The override configured for `name`.
    pub fn configured_greeting(&self, name: &str) -> CoreResult<Option<String>> {
        self.greeting_in(View::Configuration, name)
    }

    /// Every entry of `view`, sorted by name.
    pub fn list(&self, view: View) -> CoreResult<Vec<RegistryEntry>> {
        self.pipeline.new_read_transaction()?.entries(view)
    }

    fn greeting_in(&self, view: View, name: &str) -> CoreResult<Option<String>> {
        let read = self.pipeline.new_read_transaction()?;
        Ok(read
            .read(view, name)?
            .map(|entry| entry.into_parts().1))
    }
}
