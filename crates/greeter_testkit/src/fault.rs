//! Fault injection for the storage layer.
//!
//! [`FaultyBackend`] wraps a real backend and fails operations on demand.
//! The switches live in a shared [`FaultSwitches`] so a test can flip them
//! after the backend has been handed to a store.
//!
//! | Switch | Effect | Chain |
//! |---|---|---|
//! | `fail_appends` | appends return an I/O error | survives |
//! | `tear_appends` | appends write half the bytes, then fail | survives |
//! | `fail_truncates` | truncates return an I/O error | survives |
//! | `fail_reads` | reads return an I/O error | survives |
//! | `close` | every operation returns `Closed` | breaks |

use greeter_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared fault switches of a [`FaultyBackend`].
#[derive(Debug, Default)]
pub struct FaultSwitches {
    fail_appends: AtomicBool,
    tear_appends: AtomicBool,
    fail_truncates: AtomicBool,
    fail_reads: AtomicBool,
    closed: AtomicBool,
    failed_appends: AtomicUsize,
}

impl FaultSwitches {
    /// Makes appends fail with an I/O error.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes appends write a partial frame before failing.
    pub fn tear_appends(&self, tear: bool) {
        self.tear_appends.store(tear, Ordering::SeqCst);
    }

    /// Makes truncates fail, so a torn append stays in the log.
    pub fn fail_truncates(&self, fail: bool) {
        self.fail_truncates.store(fail, Ordering::SeqCst);
    }

    /// Makes reads fail with an I/O error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Closes the backend for good.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of appends that were failed.
    pub fn failed_appends(&self) -> usize {
        self.failed_appends.load(Ordering::SeqCst)
    }

    /// Turns every switch off. A closed backend stays closed.
    pub fn reset(&self) {
        self.fail_appends(false);
        self.tear_appends(false);
        self.fail_truncates(false);
        self.fail_reads(false);
    }
}

/// A storage backend that fails on demand.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    switches: Arc<FaultSwitches>,
}

impl FaultyBackend {
    /// Wraps `inner` with every switch off.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            switches: Arc::new(FaultSwitches::default()),
        }
    }

    /// Returns the switches controlling this backend.
    pub fn switches(&self) -> Arc<FaultSwitches> {
        Arc::clone(&self.switches)
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.switches.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {what} failure"),
        ))
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.check_open()?;
        if self.switches.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read"));
        }
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.check_open()?;
        if self.switches.tear_appends.load(Ordering::SeqCst) {
            self.switches.failed_appends.fetch_add(1, Ordering::SeqCst);
            let _ = self.inner.append(&data[..data.len() / 2]);
            return Err(Self::injected("torn append"));
        }
        if self.switches.fail_appends.load(Ordering::SeqCst) {
            self.switches.failed_appends.fetch_add(1, Ordering::SeqCst);
            return Err(Self::injected("append"));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.check_open()?;
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.check_open()?;
        if self.switches.fail_truncates.load(Ordering::SeqCst) {
            return Err(Self::injected("truncate"));
        }
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_storage::InMemoryBackend;

    #[test]
    fn passes_through_when_off() {
        let inner = InMemoryBackend::new();
        let mut backend = FaultyBackend::new(Box::new(inner.clone()));
        backend.append(b"abc").unwrap();
        assert_eq!(inner.data(), b"abc");
        assert_eq!(backend.read_at(0, 3).unwrap(), b"abc");
    }

    #[test]
    fn failed_append_writes_nothing() {
        let inner = InMemoryBackend::new();
        let mut backend = FaultyBackend::new(Box::new(inner.clone()));
        backend.switches().fail_appends(true);

        let err = backend.append(b"abc").unwrap_err();
        assert!(!err.is_fatal());
        assert!(inner.data().is_empty());
        assert_eq!(backend.switches().failed_appends(), 1);
    }

    #[test]
    fn torn_append_leaves_prefix() {
        let inner = InMemoryBackend::new();
        let mut backend = FaultyBackend::new(Box::new(inner.clone()));
        backend.switches().tear_appends(true);

        assert!(backend.append(b"abcd").is_err());
        assert_eq!(inner.data(), b"ab");
    }

    #[test]
    fn closed_is_fatal() {
        let mut backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        let switches = backend.switches();
        switches.close();
        switches.reset();

        let err = backend.append(b"abc").unwrap_err();
        assert!(err.is_fatal());
        assert!(backend.size().is_err());
    }
}
