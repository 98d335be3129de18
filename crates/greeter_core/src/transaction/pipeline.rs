//! Transaction pipeline and its commit worker.

use crate::error::{CoreError, CoreResult};
use crate::feed::{CommitFeed, CommitOutcome, CommitStatus};
use crate::registry::RegistryStore;
use crate::transaction::listener::{ChainFailure, ChainListener};
use crate::transaction::state::{ReadTransaction, WriteOp, WriteTransaction};
use crate::types::{SequenceNumber, TransactionId, WriterRole};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

type CommitReply = CoreResult<SequenceNumber>;

struct CommitJob {
    txid: TransactionId,
    keys: Vec<String>,
    ops: Vec<WriteOp>,
    reply: Sender<CommitReply>,
}

enum Message {
    Commit(CommitJob),
    #[cfg_attr(not(any(test, feature = "test-util")), allow(dead_code))]
    Drain(Sender<()>),
}

/// State shared between the pipeline handle and its worker.
struct Chain {
    store: Arc<RegistryStore>,
    role: WriterRole,
    listener: Arc<dyn ChainListener>,
    feed: Arc<CommitFeed>,
    broken: AtomicBool,
    failure: Mutex<Option<ChainFailure>>,
}

impl Chain {
    fn failure(&self) -> Option<ChainFailure> {
        if self.broken.load(Ordering::SeqCst) {
            self.failure.lock().clone()
        } else {
            None
        }
    }

    fn check(&self) -> CoreResult<()> {
        match self.failure() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Records the first failure and notifies the listener. Later failures
    /// leave the recorded cause untouched.
    fn mark_broken(&self, txid: Option<TransactionId>, cause: &CoreError) -> ChainFailure {
        let mut slot = self.failure.lock();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let failure = ChainFailure {
            txid,
            cause: cause.to_string(),
        };
        *slot = Some(failure.clone());
        self.broken.store(true, Ordering::SeqCst);
        drop(slot);

        self.listener.on_chain_failure(self.role, &failure);
        failure
    }

    fn process(&self, job: CommitJob) {
        let CommitJob {
            txid,
            keys,
            ops,
            reply,
        } = job;

        let (result, status) = if let Some(failure) = self.failure() {
            debug!(%txid, "skipping commit on broken chain");
            (
                Err(failure.to_error()),
                CommitStatus::Skipped {
                    cause: failure.cause,
                },
            )
        } else {
            match self.store.commit(txid, &ops) {
                Ok(seq) => (Ok(seq), CommitStatus::Committed { sequence: seq }),
                Err(e) if e.is_chain_fatal() => {
                    let failure = self.mark_broken(Some(txid), &e);
                    (
                        Err(failure.to_error()),
                        CommitStatus::ChainBroken {
                            cause: failure.cause,
                        },
                    )
                }
                Err(e) => {
                    warn!(role = %self.role, %txid, error = %e, "commit failed");
                    let reason = e.to_string();
                    (
                        Err(CoreError::CommitFailed {
                            txid,
                            source: Box::new(e),
                        }),
                        CommitStatus::Failed { reason },
                    )
                }
            }
        };

        self.feed.emit(CommitOutcome {
            position: 0,
            txid,
            role: self.role,
            status,
            keys,
        });
        // The submitter may have dropped its PendingCommit.
        let _ = reply.send(result);
    }

    fn run(&self, queue: Receiver<Message>) {
        for message in queue {
            match message {
                Message::Commit(job) => self.process(job),
                Message::Drain(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }
}

/// Serializes the transactions of one logical writer.
///
/// Each pipeline owns a commit worker thread. Submitted write transactions
/// are committed one at a time in submission order; [`submit`] returns as
/// soon as the transaction is queued.
///
/// A chain-fatal commit failure (see [`CoreError::is_chain_fatal`]) breaks
/// the chain: transactions still queued complete with
/// [`CoreError::ChainBroken`] without reaching the store, and every later
/// call fails fast with the same error. A broken pipeline is never repaired;
/// the owner creates a new one.
///
/// [`submit`]: TransactionPipeline::submit
pub struct TransactionPipeline {
    chain: Arc<Chain>,
    /// Queue to the worker. `None` once closed.
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_submitted: Mutex<Option<TransactionId>>,
}

impl TransactionPipeline {
    /// Creates a pipeline writing as `role` and starts its commit worker.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker thread cannot be spawned.
    pub fn new(
        store: Arc<RegistryStore>,
        role: WriterRole,
        listener: Arc<dyn ChainListener>,
        feed: Arc<CommitFeed>,
    ) -> CoreResult<Self> {
        let chain = Arc::new(Chain {
            store,
            role,
            listener,
            feed,
            broken: AtomicBool::new(false),
            failure: Mutex::new(None),
        });

        let (sender, queue) = mpsc::channel();
        let worker_chain = Arc::clone(&chain);
        let worker = thread::Builder::new()
            .name(format!("greeter-commit-{role}"))
            .spawn(move || worker_chain.run(queue))?;

        debug!(%role, "transaction pipeline started");
        Ok(Self {
            chain,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            last_submitted: Mutex::new(None),
        })
    }

    /// Returns the writer role of this pipeline.
    #[must_use]
    pub fn role(&self) -> WriterRole {
        self.chain.role
    }

    /// Returns the store this pipeline writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.chain.store
    }

    /// Returns the feed commit outcomes are published to.
    #[must_use]
    pub fn feed(&self) -> &Arc<CommitFeed> {
        &self.chain.feed
    }

    /// Opens a read transaction at the latest committed sequence.
    pub fn new_read_transaction(&self) -> CoreResult<ReadTransaction> {
        self.ensure_usable()?;
        let txn = ReadTransaction::new(Arc::clone(&self.chain.store));
        debug!(role = %self.chain.role, seq = txn.snapshot().as_u64(), "read transaction opened");
        Ok(txn)
    }

    /// Opens a write transaction ordered after everything submitted so far.
    pub fn new_write_transaction(&self) -> CoreResult<WriteTransaction> {
        self.ensure_usable()?;
        let txid = self.chain.store.allocate_txid();
        debug!(role = %self.chain.role, %txid, "write transaction opened");
        Ok(WriteTransaction::new(txid, self.chain.role))
    }

    /// Queues `txn` for commit and returns without waiting.
    ///
    /// # Errors
    ///
    /// Fails fast with [`CoreError::ChainBroken`] on a broken chain, with
    /// [`CoreError::PipelineClosed`] once the pipeline is closed, and with
    /// [`CoreError::InvalidOperation`] when `txn` was opened by a pipeline
    /// of another role.
    pub fn submit(&self, txn: WriteTransaction) -> CoreResult<PendingCommit> {
        self.chain.check()?;
        if txn.role() != self.chain.role {
            return Err(CoreError::invalid_operation(format!(
                "{} transaction submitted to {} pipeline",
                txn.role(),
                self.chain.role
            )));
        }

        let txid = txn.txid();
        let (reply, receiver) = mpsc::channel();
        let job = CommitJob {
            txid,
            keys: txn.keys(),
            ops: txn.into_ops(),
            reply,
        };

        // Holding the sender lock makes queue order equal to the order
        // recorded in `last_submitted`.
        let sender = self.sender.lock();
        let Some(queue) = sender.as_ref() else {
            return Err(CoreError::PipelineClosed);
        };
        if queue.send(Message::Commit(job)).is_err() {
            return Err(CoreError::CommitAbandoned { txid });
        }
        *self.last_submitted.lock() = Some(txid);
        drop(sender);

        debug!(role = %self.chain.role, %txid, "transaction submitted");
        Ok(PendingCommit { txid, receiver })
    }

    /// Marks the chain broken and notifies the listener.
    ///
    /// Only the first failure is recorded. Everything queued after it
    /// completes with [`CoreError::ChainBroken`].
    pub fn on_chain_failure(&self, txid: Option<TransactionId>, cause: &CoreError) {
        self.chain.mark_broken(txid, cause);
    }

    /// Returns true once the chain has broken.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.chain.broken.load(Ordering::SeqCst)
    }

    /// Returns the recorded chain failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<ChainFailure> {
        self.chain.failure()
    }

    /// Returns the most recently submitted transaction.
    #[must_use]
    pub fn last_submitted(&self) -> Option<TransactionId> {
        *self.last_submitted.lock()
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stops accepting work and waits for every queued commit to settle.
    ///
    /// Notifies the listener of success when the chain never broke. Calling
    /// it again does nothing.
    pub fn close(&self) -> CoreResult<()> {
        let Some(sender) = self.sender.lock().take() else {
            return Ok(());
        };
        drop(sender);

        if let Some(worker) = self.worker.lock().take() {
            worker
                .join()
                .map_err(|_| CoreError::invalid_operation("commit worker panicked"))?;
        }

        if !self.is_broken() {
            self.chain.listener.on_chain_success(self.chain.role);
        }
        debug!(role = %self.chain.role, "transaction pipeline closed");
        Ok(())
    }

    /// Blocks until every transaction submitted so far has settled.
    #[cfg(any(test, feature = "test-util"))]
    pub fn drain(&self) {
        let Some(queue) = self.sender.lock().clone() else {
            return;
        };
        let (ack, done) = mpsc::channel();
        if queue.send(Message::Drain(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    fn ensure_usable(&self) -> CoreResult<()> {
        self.chain.check()?;
        if self.is_closed() {
            return Err(CoreError::PipelineClosed);
        }
        Ok(())
    }
}

impl Drop for TransactionPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(role = %self.chain.role, error = %e, "pipeline close failed on drop");
        }
    }
}

impl std::fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("role", &self.chain.role)
            .field("broken", &self.is_broken())
            .field("last_submitted", &self.last_submitted())
            .finish_non_exhaustive()
    }
}

/// The eventual outcome of a submitted transaction.
///
/// Dropping it does not cancel the commit.
#[derive(Debug)]
pub struct PendingCommit {
    txid: TransactionId,
    receiver: Receiver<CommitReply>,
}

impl PendingCommit {
    /// Returns the transaction ID.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        self.txid
    }

    /// Blocks until the commit settles.
    pub fn wait(self) -> CoreResult<SequenceNumber> {
        self.receiver
            .recv()
            .unwrap_or(Err(CoreError::CommitAbandoned { txid: self.txid }))
    }

    /// Blocks for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitTimeout`] if the commit has not settled in
    /// time. The commit itself still proceeds.
    pub fn wait_timeout(self, timeout: Duration) -> CoreResult<SequenceNumber> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CoreError::CommitTimeout {
                txid: self.txid,
                waited: timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CoreError::CommitAbandoned { txid: self.txid })
            }
        }
    }

    /// Returns the outcome if the commit has settled.
    ///
    /// The outcome is handed out once; later calls report
    /// [`CoreError::CommitAbandoned`].
    pub fn try_result(&self) -> Option<CoreResult<SequenceNumber>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(CoreError::CommitAbandoned { txid: self.txid }))
            }
        }
    }
}
