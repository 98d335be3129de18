//! Read and write transaction state.

use crate::entry::RegistryEntry;
use crate::error::{CoreError, CoreResult};
use crate::registry::RegistryStore;
use crate::types::{SequenceNumber, TransactionId, View, WriterRole};
use std::sync::Arc;

/// A buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create the registry root of a view.
    CreateRoot(View),
    /// Insert or replace an entry.
    Put {
        /// Target view.
        view: View,
        /// The entry, keyed by its name.
        entry: RegistryEntry,
    },
}

/// A read-only view of the registry at a fixed snapshot.
///
/// The snapshot is pinned until the transaction is dropped.
pub struct ReadTransaction {
    store: Arc<RegistryStore>,
    snapshot: SequenceNumber,
}

impl ReadTransaction {
    pub(crate) fn new(store: Arc<RegistryStore>) -> Self {
        let snapshot = store.acquire_snapshot();
        Self { store, snapshot }
    }

    /// Returns the snapshot sequence this transaction reads at.
    #[must_use]
    pub fn snapshot(&self) -> SequenceNumber {
        self.snapshot
    }

    /// Reads the entry for `name` in `view`.
    ///
    /// A name never written, or a view without a root, reads as `None`.
    pub fn read(&self, view: View, name: &str) -> CoreResult<Option<RegistryEntry>> {
        self.store.read_at(view, name, self.snapshot)
    }

    /// All entries of `view` visible at the snapshot, sorted by name.
    pub fn entries(&self, view: View) -> CoreResult<Vec<RegistryEntry>> {
        self.store.entries_at(view, self.snapshot)
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        self.store.release_snapshot(self.snapshot);
    }
}

impl std::fmt::Debug for ReadTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTransaction")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

/// A buffered set of writes, committed as one unit when submitted.
#[derive(Debug)]
pub struct WriteTransaction {
    txid: TransactionId,
    role: WriterRole,
    ops: Vec<WriteOp>,
}

impl WriteTransaction {
    pub(crate) fn new(txid: TransactionId, role: WriterRole) -> Self {
        Self {
            txid,
            role,
            ops: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        self.txid
    }

    /// Returns the role of the pipeline that opened this transaction.
    #[must_use]
    pub fn role(&self) -> WriterRole {
        self.role
    }

    /// Buffers a put of `entry` under `name`.
    ///
    /// A later put of the same name in the same view replaces this one.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ViewNotWritable`] if the role may not write `view`
    /// - [`CoreError::KeyMismatch`] if `name` is not the entry's name
    pub fn put(&mut self, view: View, name: &str, entry: RegistryEntry) -> CoreResult<()> {
        if !self.role.may_write(view) {
            return Err(CoreError::ViewNotWritable {
                view,
                role: self.role,
            });
        }
        if name != entry.name() {
            return Err(CoreError::KeyMismatch {
                key: name.to_string(),
                entry_name: entry.name().to_string(),
            });
        }

        let existing = self.ops.iter_mut().find(|op| {
            matches!(op, WriteOp::Put { view: v, entry: e } if *v == view && e.name() == name)
        });
        match existing {
            Some(op) => *op = WriteOp::Put { view, entry },
            None => self.ops.push(WriteOp::Put { view, entry }),
        }
        Ok(())
    }

    pub(crate) fn create_root(&mut self, view: View) -> CoreResult<()> {
        if !self.role.may_create_root() {
            return Err(CoreError::invalid_operation(format!(
                "{} pipeline may not create registry roots",
                self.role
            )));
        }
        if !self.ops.contains(&WriteOp::CreateRoot(view)) {
            self.ops.push(WriteOp::CreateRoot(view));
        }
        Ok(())
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.ops.len()
    }

    /// Names touched by this transaction, in buffer order.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                WriteOp::Put { entry, .. } => Some(entry.name().to_string()),
                WriteOp::CreateRoot(_) => None,
            })
            .collect()
    }

    pub(crate) fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, greeting: &str) -> RegistryEntry {
        RegistryEntry::new(name, greeting).unwrap()
    }

    #[test]
    fn resolver_cannot_write_configuration() {
        let mut txn = WriteTransaction::new(TransactionId::new(1), WriterRole::Resolver);
        let err = txn
            .put(View::Configuration, "a", entry("a", "x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::ViewNotWritable { .. }));
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn key_must_match_entry() {
        let mut txn = WriteTransaction::new(TransactionId::new(1), WriterRole::Administrator);
        let err = txn
            .put(View::Configuration, "b", entry("a", "x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::KeyMismatch { .. }));
    }

    #[test]
    fn later_put_replaces_earlier() {
        let mut txn = WriteTransaction::new(TransactionId::new(1), WriterRole::Resolver);
        txn.put(View::Operational, "a", entry("a", "one")).unwrap();
        txn.put(View::Operational, "b", entry("b", "two")).unwrap();
        txn.put(View::Operational, "a", entry("a", "three")).unwrap();

        assert_eq!(txn.write_count(), 2);
        assert_eq!(txn.keys(), vec!["a", "b"]);
        assert_eq!(
            txn.into_ops()[0],
            WriteOp::Put {
                view: View::Operational,
                entry: entry("a", "three")
            }
        );
    }

    #[test]
    fn only_bootstrap_creates_roots() {
        let mut txn = WriteTransaction::new(TransactionId::new(1), WriterRole::Administrator);
        assert!(txn.create_root(View::Configuration).is_err());

        let mut txn = WriteTransaction::new(TransactionId::new(2), WriterRole::Bootstrap);
        txn.create_root(View::Configuration).unwrap();
        txn.create_root(View::Configuration).unwrap();
        assert_eq!(txn.write_count(), 1);
        assert!(txn.put(View::Operational, "a", entry("a", "x")).is_err());
    }

    #[test]
    fn read_transaction_releases_snapshot() {
        let store = Arc::new(RegistryStore::in_memory().unwrap());
        store.initialize_root().unwrap();
        let txn = ReadTransaction::new(Arc::clone(&store));
        assert_eq!(txn.snapshot(), store.committed_seq());
        assert!(txn.read(View::Operational, "nobody").unwrap().is_none());
        assert!(txn.entries(View::Configuration).unwrap().is_empty());
        drop(txn);
    }
}
