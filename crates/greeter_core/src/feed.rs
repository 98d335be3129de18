//! Commit outcome feed.
//!
//! Fire-and-forget writes never report back to the code that submitted
//! them. Their outcomes are published here instead, so owners and tests can
//! observe what became of each transaction.
//!
//! ```rust,ignore
//! let outcomes = feed.subscribe();
//! resolver.resolve("Ada")?;
//! let outcome = outcomes.recv()?;
//! assert!(outcome.is_committed());
//! ```

use crate::types::{SequenceNumber, TransactionId, WriterRole};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Default number of outcomes kept for polling.
const DEFAULT_HISTORY: usize = 1024;

/// How a submitted transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    /// Applied at `sequence`.
    Committed {
        /// Sequence the commit was applied at.
        sequence: SequenceNumber,
    },
    /// The commit failed; the chain continues.
    Failed {
        /// Description of the failure.
        reason: String,
    },
    /// The commit failed and broke the chain.
    ChainBroken {
        /// The recorded chain failure.
        cause: String,
    },
    /// Not attempted because the chain was already broken.
    Skipped {
        /// The recorded chain failure.
        cause: String,
    },
}

/// Outcome of one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Position in the feed, assigned by [`CommitFeed::emit`]. Strictly
    /// increasing in emit order; the cursor for [`CommitFeed::poll`].
    pub position: u64,
    /// The transaction.
    pub txid: TransactionId,
    /// Role of the pipeline that submitted it.
    pub role: WriterRole,
    /// How it ended.
    pub status: CommitStatus,
    /// Names it wrote.
    pub keys: Vec<String>,
}

impl CommitOutcome {
    /// Returns true if the transaction was applied.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self.status, CommitStatus::Committed { .. })
    }
}

/// Distributes commit outcomes to subscribers and keeps a bounded history.
///
/// Outcomes from one pipeline arrive in commit order. Transaction ids are
/// handed out when a transaction is opened, so with several writers they do
/// not follow emit order; positions do.
pub struct CommitFeed {
    subscribers: RwLock<Vec<Sender<CommitOutcome>>>,
    history: RwLock<History>,
    max_history: usize,
}

struct History {
    outcomes: VecDeque<CommitOutcome>,
    next_position: u64,
}

impl CommitFeed {
    /// Creates a feed with the default history size.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_HISTORY)
    }

    /// Creates a feed keeping at most `max_history` outcomes.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(History {
                outcomes: VecDeque::new(),
                next_position: 1,
            }),
            max_history,
        }
    }

    /// Returns a receiver for every outcome emitted from now on.
    pub fn subscribe(&self) -> Receiver<CommitOutcome> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publishes an outcome and returns the position it was given.
    /// Disconnected subscribers are dropped.
    pub fn emit(&self, mut outcome: CommitOutcome) -> u64 {
        let mut history = self.history.write();
        outcome.position = history.next_position;
        history.next_position += 1;
        history.outcomes.push_back(outcome.clone());
        while history.outcomes.len() > self.max_history {
            history.outcomes.pop_front();
        }

        // Held across the sends so subscribers see positions in order.
        let position = outcome.position;
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(outcome.clone()).is_ok());
        position
    }

    /// The last `limit` outcomes, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CommitOutcome> {
        let history = self.history.read();
        let skip = history.outcomes.len().saturating_sub(limit);
        history.outcomes.iter().skip(skip).cloned().collect()
    }

    /// Outcomes emitted after position `cursor`, up to `limit`, oldest
    /// first. Pass 0 to start from the oldest retained outcome and then the
    /// `position` of the last outcome seen.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<CommitOutcome> {
        self.history
            .read()
            .outcomes
            .iter()
            .filter(|o| o.position > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Every retained outcome that did not commit.
    pub fn failures(&self) -> Vec<CommitOutcome> {
        self.history
            .read()
            .outcomes
            .iter()
            .filter(|o| !o.is_committed())
            .cloned()
            .collect()
    }

    /// Number of retained outcomes.
    pub fn history_len(&self) -> usize {
        self.history.read().outcomes.len()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for CommitFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommitFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitFeed")
            .field("history_len", &self.history_len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
