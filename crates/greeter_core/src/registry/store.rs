//! Registry store.

use crate::config::RegistryConfig;
use crate::entry::RegistryEntry;
use crate::error::{CoreError, CoreResult};
use crate::feed::CommitFeed;
use crate::log::{CommitLog, CommitRecord, LogOp};
use crate::registry::view::ViewTable;
use crate::transaction::{LoggingChainListener, TransactionPipeline, WriteOp};
use crate::types::{SequenceNumber, TransactionId, View, WriterRole};
use greeter_storage::{InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

struct Views {
    configuration: ViewTable,
    operational: ViewTable,
    committed: SequenceNumber,
}

impl Views {
    fn table(&self, view: View) -> &ViewTable {
        match view {
            View::Configuration => &self.configuration,
            View::Operational => &self.operational,
        }
    }

    fn table_mut(&mut self, view: View) -> &mut ViewTable {
        match view {
            View::Configuration => &mut self.configuration,
            View::Operational => &mut self.operational,
        }
    }

    fn apply(&mut self, seq: SequenceNumber, ops: &[LogOp]) {
        for op in ops {
            match op {
                LogOp::CreateRoot { view } => {
                    self.table_mut(*view).create_root(seq);
                }
                LogOp::Put { view, entry } => {
                    self.table_mut(*view).install(seq, entry.clone());
                }
            }
        }
        self.committed = seq;
    }
}

/// The two-view registry.
///
/// The store provides:
/// - Snapshot reads: a reader sees exactly the commits at or below its
///   snapshot sequence
/// - Atomic batch commits, made durable in the commit log before they
///   become visible
/// - Recovery by replaying the commit log on open
///
/// Writes reach the store only through a [`TransactionPipeline`].
pub struct RegistryStore {
    log: CommitLog,
    views: RwLock<Views>,
    /// Active snapshots with their reader counts.
    snapshots: Mutex<BTreeMap<SequenceNumber, usize>>,
    /// Serializes commits from different pipelines.
    commit_lock: Mutex<()>,
    next_txid: AtomicU64,
    closed: AtomicBool,
    config: RegistryConfig,
}

impl RegistryStore {
    /// Opens a registry on `backend`, replaying any commit log it holds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogCorruption`] if the log is damaged before its
    /// final record, or a storage error if the backend cannot be read.
    pub fn open(backend: Box<dyn StorageBackend>, config: RegistryConfig) -> CoreResult<Self> {
        let log = CommitLog::new(backend, config.sync_on_commit);
        let records = log.replay()?;

        let mut views = Views {
            configuration: ViewTable::default(),
            operational: ViewTable::default(),
            committed: SequenceNumber::ZERO,
        };
        let mut max_txid = 0u64;
        for (offset, record) in &records {
            if record.sequence() <= views.committed {
                return Err(CoreError::log_corruption(
                    *offset,
                    format!(
                        "{} does not follow {}",
                        record.sequence(),
                        views.committed
                    ),
                ));
            }
            views.apply(record.sequence(), record.ops());
            max_txid = max_txid.max(record.txid().as_u64());
        }

        if !records.is_empty() {
            info!(
                records = records.len(),
                seq = views.committed.as_u64(),
                "recovered registry from commit log"
            );
        }

        Ok(Self {
            log,
            views: RwLock::new(views),
            snapshots: Mutex::new(BTreeMap::new()),
            commit_lock: Mutex::new(()),
            next_txid: AtomicU64::new(max_txid + 1),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Opens an empty registry held in memory.
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), RegistryConfig::default())
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Creates the registry root in both views.
    ///
    /// Runs as a single transaction on a bootstrap pipeline and blocks until
    /// it commits. Succeeds without writing when both roots already exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RootInitFailed`] carrying the underlying cause.
    pub fn initialize_root(self: &Arc<Self>) -> CoreResult<()> {
        let missing: Vec<View> = View::ALL
            .into_iter()
            .filter(|view| !self.has_root(*view))
            .collect();
        if missing.is_empty() {
            debug!("registry roots already present");
            return Ok(());
        }

        let result = self.create_roots(&missing);
        match &result {
            Ok(seq) => info!(seq = seq.as_u64(), "registry roots initialized"),
            Err(e) => debug!(error = %e, "registry root initialization failed"),
        }
        result
            .map(|_| ())
            .map_err(|e| CoreError::root_init_failed(e.to_string()))
    }

    fn create_roots(self: &Arc<Self>, views: &[View]) -> CoreResult<SequenceNumber> {
        let pipeline = TransactionPipeline::new(
            Arc::clone(self),
            WriterRole::Bootstrap,
            Arc::new(LoggingChainListener),
            Arc::new(CommitFeed::with_max_history(self.config.outcome_history)),
        )?;
        let mut txn = pipeline.new_write_transaction()?;
        for view in views {
            txn.create_root(*view)?;
        }
        let seq = pipeline.submit(txn)?.wait();
        pipeline.close()?;
        seq
    }

    /// Returns true if the root of `view` has been created.
    #[must_use]
    pub fn has_root(&self, view: View) -> bool {
        self.views.read().table(view).has_root()
    }

    /// Returns the sequence of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.views.read().committed
    }

    /// Latest committed entries of `view`, sorted by name.
    pub fn entries(&self, view: View) -> CoreResult<Vec<RegistryEntry>> {
        self.ensure_open()?;
        let views = self.views.read();
        Ok(views.table(view).entries_at(views.committed))
    }

    /// Closes the store. Later commits and reads fail with
    /// [`CoreError::StoreClosed`].
    pub fn close(&self) -> CoreResult<()> {
        let _commit = self.commit_lock.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.log.sync()?;
        info!(seq = self.committed_seq().as_u64(), "registry store closed");
        Ok(())
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Size of the commit log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Pins the latest committed sequence as a snapshot.
    ///
    /// Registered under the views lock so a concurrent commit cannot prune
    /// versions the new snapshot still needs.
    pub(crate) fn acquire_snapshot(&self) -> SequenceNumber {
        let views = self.views.read();
        let seq = views.committed;
        *self.snapshots.lock().entry(seq).or_insert(0) += 1;
        seq
    }

    pub(crate) fn release_snapshot(&self, seq: SequenceNumber) {
        let mut snapshots = self.snapshots.lock();
        if let Some(count) = snapshots.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                snapshots.remove(&seq);
            }
        }
    }

    pub(crate) fn read_at(
        &self,
        view: View,
        name: &str,
        snapshot: SequenceNumber,
    ) -> CoreResult<Option<RegistryEntry>> {
        self.ensure_open()?;
        Ok(self.views.read().table(view).get_at(name, snapshot).cloned())
    }

    pub(crate) fn entries_at(
        &self,
        view: View,
        snapshot: SequenceNumber,
    ) -> CoreResult<Vec<RegistryEntry>> {
        self.ensure_open()?;
        Ok(self.views.read().table(view).entries_at(snapshot))
    }

    /// Applies a batch atomically.
    ///
    /// The record is appended to the commit log first; nothing becomes
    /// visible if the append fails. A batch with nothing left to change
    /// after dropping existing roots and identical puts writes no record and
    /// returns the current committed sequence.
    pub(crate) fn commit(&self, txid: TransactionId, ops: &[WriteOp]) -> CoreResult<SequenceNumber> {
        let _commit = self.commit_lock.lock();
        self.ensure_open()?;

        let (seq, effective) = {
            let views = self.views.read();
            (views.committed.next(), Self::effective_ops(&views, ops)?)
        };
        if effective.is_empty() {
            let committed = self.committed_seq();
            debug!(%txid, seq = committed.as_u64(), "commit changed nothing");
            return Ok(committed);
        }

        let record = CommitRecord::new(seq, txid, effective);
        if let Err(e) = self.log.append(&record) {
            if e.is_chain_fatal() {
                self.closed.store(true, Ordering::SeqCst);
                error!(%txid, error = %e, "commit log unusable, closing registry store");
            }
            return Err(e);
        }

        let mut views = self.views.write();
        views.apply(seq, record.ops());

        let horizon = self
            .snapshots
            .lock()
            .keys()
            .next()
            .copied()
            .unwrap_or(seq);
        for op in record.ops() {
            if let LogOp::Put { view, entry } = op {
                views.table_mut(*view).prune(entry.name(), horizon);
            }
        }

        debug!(%txid, seq = seq.as_u64(), ops = record.ops().len(), "commit applied");
        Ok(seq)
    }

    fn effective_ops(views: &Views, ops: &[WriteOp]) -> CoreResult<Vec<LogOp>> {
        let mut created = Vec::new();
        let mut effective = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::CreateRoot(view) => {
                    if !views.table(*view).has_root() && !created.contains(view) {
                        created.push(*view);
                        effective.push(LogOp::CreateRoot { view: *view });
                    }
                }
                WriteOp::Put { view, entry } => {
                    let table = views.table(*view);
                    if !table.has_root() && !created.contains(view) {
                        return Err(CoreError::RootNotInitialized { view: *view });
                    }
                    if table.latest(entry.name()) != Some(entry) {
                        effective.push(LogOp::Put {
                            view: *view,
                            entry: entry.clone(),
                        });
                    }
                }
            }
        }

        Ok(effective)
    }

    /// Holds the commit lock, stalling every commit worker until dropped.
    #[cfg(test)]
    pub(crate) fn pause_commits(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    #[cfg(test)]
    pub(crate) fn version_count(&self, view: View, name: &str) -> usize {
        self.views.read().table(view).version_count(name)
    }
}

impl std::fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryStore")
            .field("committed_seq", &self.committed_seq())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, greeting: &str) -> RegistryEntry {
        RegistryEntry::new(name, greeting).unwrap()
    }

    fn put(view: View, name: &str, greeting: &str) -> WriteOp {
        WriteOp::Put {
            view,
            entry: entry(name, greeting),
        }
    }

    fn rooted() -> Arc<RegistryStore> {
        let store = Arc::new(RegistryStore::in_memory().unwrap());
        store.initialize_root().unwrap();
        store
    }

    #[test]
    fn initialize_root_creates_both_roots() {
        let store = Arc::new(RegistryStore::in_memory().unwrap());
        assert!(!store.has_root(View::Configuration));

        store.initialize_root().unwrap();
        assert!(store.has_root(View::Configuration));
        assert!(store.has_root(View::Operational));
        assert_eq!(store.committed_seq().as_u64(), 1);

        let size = store.log_size().unwrap();
        store.initialize_root().unwrap();
        assert_eq!(store.committed_seq().as_u64(), 1);
        assert_eq!(store.log_size().unwrap(), size);
    }

    #[test]
    fn put_without_root_fails() {
        let store = RegistryStore::in_memory().unwrap();
        let txid = store.allocate_txid();
        let err = store
            .commit(txid, &[put(View::Operational, "a", "Hello a")])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::RootNotInitialized {
                view: View::Operational
            }
        ));
        assert!(!err.is_chain_fatal());
    }

    #[test]
    fn read_without_root_is_absent() {
        let store = RegistryStore::in_memory().unwrap();
        let snapshot = store.acquire_snapshot();
        assert!(store
            .read_at(View::Configuration, "a", snapshot)
            .unwrap()
            .is_none());
        store.release_snapshot(snapshot);
    }

    #[test]
    fn snapshot_isolation() {
        let store = rooted();
        let before = store.acquire_snapshot();

        let seq = store
            .commit(store.allocate_txid(), &[put(View::Configuration, "a", "Hola a")])
            .unwrap();
        assert!(seq > before);

        assert!(store.read_at(View::Configuration, "a", before).unwrap().is_none());
        let after = store.acquire_snapshot();
        assert_eq!(
            store
                .read_at(View::Configuration, "a", after)
                .unwrap()
                .unwrap()
                .greeting(),
            "Hola a"
        );
        store.release_snapshot(before);
        store.release_snapshot(after);
    }

    #[test]
    fn identical_put_writes_nothing() {
        let store = rooted();
        let first = store
            .commit(store.allocate_txid(), &[put(View::Configuration, "a", "x")])
            .unwrap();
        let size = store.log_size().unwrap();

        let second = store
            .commit(store.allocate_txid(), &[put(View::Configuration, "a", "x")])
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.log_size().unwrap(), size);
        assert_eq!(store.entries(View::Configuration).unwrap().len(), 1);
    }

    #[test]
    fn old_versions_pruned_without_readers() {
        let store = rooted();
        for greeting in ["a", "b", "c"] {
            store
                .commit(store.allocate_txid(), &[put(View::Operational, "k", greeting)])
                .unwrap();
        }
        assert_eq!(store.version_count(View::Operational, "k"), 1);
    }

    #[test]
    fn pinned_snapshot_keeps_its_version() {
        let store = rooted();
        store
            .commit(store.allocate_txid(), &[put(View::Operational, "k", "a")])
            .unwrap();
        let pinned = store.acquire_snapshot();
        for greeting in ["b", "c"] {
            store
                .commit(store.allocate_txid(), &[put(View::Operational, "k", greeting)])
                .unwrap();
        }

        assert_eq!(
            store
                .read_at(View::Operational, "k", pinned)
                .unwrap()
                .unwrap()
                .greeting(),
            "a"
        );
        store.release_snapshot(pinned);
    }

    #[test]
    fn reopen_replays_log() {
        let backend = InMemoryBackend::new();
        {
            let store = Arc::new(
                RegistryStore::open(Box::new(backend.clone()), RegistryConfig::default()).unwrap(),
            );
            store.initialize_root().unwrap();
            store
                .commit(store.allocate_txid(), &[put(View::Configuration, "Colin Dixon", "Hola Colin Dixon")])
                .unwrap();
            store.close().unwrap();
        }

        let store = RegistryStore::open(Box::new(backend), RegistryConfig::default()).unwrap();
        assert!(store.has_root(View::Configuration));
        assert!(store.has_root(View::Operational));
        assert_eq!(store.committed_seq().as_u64(), 2);
        let entries = store.entries(View::Configuration).unwrap();
        assert_eq!(entries, vec![entry("Colin Dixon", "Hola Colin Dixon")]);
        assert!(store.allocate_txid().as_u64() > 1);
    }

    #[test]
    fn out_of_order_record_reports_its_offset() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        let record = |seq: u64| {
            CommitRecord::new(
                SequenceNumber::new(seq),
                TransactionId::new(seq),
                vec![LogOp::CreateRoot {
                    view: View::Configuration,
                }],
            )
        };
        log.append(&record(2)).unwrap();
        let stale = log.append(&record(2)).unwrap();
        assert!(stale > 0);

        let err = RegistryStore::open(Box::new(backend), RegistryConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset, .. } if offset == stale));
    }

    #[test]
    fn closed_store_rejects_work() {
        let store = rooted();
        store.close().unwrap();
        assert!(store.is_closed());

        let err = store
            .commit(store.allocate_txid(), &[put(View::Operational, "a", "b")])
            .unwrap_err();
        assert!(matches!(err, CoreError::StoreClosed));
        assert!(matches!(
            store.entries(View::Operational),
            Err(CoreError::StoreClosed)
        ));
    }
}
