//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte store holding the registry commit log.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` returns, appended data survives a process exit
/// - after `sync` returns, it also survives a power loss
///
/// Implementations must be `Send + Sync`; the registry keeps its backend
/// behind a mutex and hands it to the commit worker thread.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range is not fully inside the store.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes appended data out of process buffers.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is where the next append lands.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes and forces data and metadata onto durable media.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the store back to `new_size` bytes.
    ///
    /// Recovery uses this to drop a torn record at the tail of the log.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
