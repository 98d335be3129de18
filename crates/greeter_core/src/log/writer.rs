//! Commit log writer and recovery reader.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{checksum_matches, CommitRecord, FrameHeader, CRC_SIZE, HEADER_SIZE};
use greeter_storage::StorageBackend;
use parking_lot::Mutex;
use tracing::warn;

/// Append-only log of commit records on a storage backend.
pub(crate) struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl CommitLog {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends one record and makes it durable.
    ///
    /// On failure the log is cut back to its previous size so that a partial
    /// frame never sits in front of later records. If the cut itself fails
    /// the log is reported corrupted.
    pub(crate) fn append(&self, record: &CommitRecord) -> CoreResult<u64> {
        let frame = record.encode_frame()?;
        let mut backend = self.backend.lock();
        let start = backend.size()?;

        match Self::write_frame(backend.as_mut(), &frame, self.sync_on_commit) {
            Ok(offset) => Ok(offset),
            Err(e) => match backend.truncate(start) {
                Ok(()) => Err(e.into()),
                Err(cut) => {
                    warn!(offset = start, error = %cut, "could not cut back failed commit frame");
                    Err(CoreError::log_corruption(
                        start,
                        format!("partial frame left behind: {e}"),
                    ))
                }
            },
        }
    }

    fn write_frame(
        backend: &mut dyn StorageBackend,
        frame: &[u8],
        sync: bool,
    ) -> greeter_storage::StorageResult<u64> {
        let offset = backend.append(frame)?;
        if sync {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(offset)
    }

    /// Reads every complete record from the start of the log, paired with
    /// the offset of its frame.
    ///
    /// A torn final record is what an interrupted append leaves behind: a
    /// short header, a checksummed header whose frame runs past the end of
    /// the log, or a bad payload checksum on a frame that ends exactly at
    /// the end of the log. It is dropped and the log truncated before it.
    /// Damage anywhere else, including a header that fails its own
    /// checksum, is [`CoreError::LogCorruption`] and leaves the log as is.
    pub(crate) fn replay(&self) -> CoreResult<Vec<(u64, CommitRecord)>> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset < size {
            let remaining = size - offset;
            if remaining < HEADER_SIZE as u64 {
                break;
            }

            let header = backend.read_at(offset, HEADER_SIZE)?;
            let parsed = FrameHeader::parse(offset, &header)?;
            if parsed.frame_len() > remaining {
                break;
            }

            let body = backend.read_at(
                offset + HEADER_SIZE as u64,
                parsed.payload_len + CRC_SIZE,
            )?;
            if !checksum_matches(&header, &body) {
                if offset + parsed.frame_len() == size {
                    break;
                }
                return Err(CoreError::log_corruption(offset, "checksum mismatch"));
            }

            let record = CommitRecord::decode_payload(offset, &body[..parsed.payload_len])?;
            records.push((offset, record));
            offset += parsed.frame_len();
        }

        if offset < size {
            warn!(
                offset,
                discarded = size - offset,
                "discarding torn commit log tail"
            );
            backend.truncate(offset)?;
        }

        Ok(records)
    }

    /// Current size of the log in bytes.
    pub(crate) fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Syncs everything appended so far.
    pub(crate) fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RegistryEntry;
    use crate::log::LogOp;
    use crate::types::{SequenceNumber, TransactionId, View};
    use greeter_storage::InMemoryBackend;

    fn record(seq: u64, name: &str) -> CommitRecord {
        CommitRecord::new(
            SequenceNumber::new(seq),
            TransactionId::new(seq + 100),
            vec![LogOp::Put {
                view: View::Configuration,
                entry: RegistryEntry::new(name, format!("Hola {name}")).unwrap(),
            }],
        )
    }

    fn replayed(log: &CommitLog) -> Vec<CommitRecord> {
        log.replay()
            .unwrap()
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    #[test]
    fn append_then_replay() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);

        assert_eq!(log.append(&record(1, "a")).unwrap(), 0);
        let second = log.append(&record(2, "b")).unwrap();

        let reopened = CommitLog::new(Box::new(backend), true);
        let records = reopened.replay().unwrap();
        assert_eq!(records, vec![(0, record(1, "a")), (second, record(2, "b"))]);
    }

    #[test]
    fn empty_log_replays_nothing() {
        let log = CommitLog::new(Box::new(InMemoryBackend::new()), false);
        assert!(log.replay().unwrap().is_empty());
        assert_eq!(log.size().unwrap(), 0);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        log.append(&record(1, "a")).unwrap();
        let good_len = backend.data().len();

        let frame = record(2, "b").encode_frame().unwrap();
        let mut bytes = backend.data();
        bytes.extend_from_slice(&frame[..frame.len() / 2]);

        let torn = InMemoryBackend::with_data(bytes);
        let reopened = CommitLog::new(Box::new(torn.clone()), true);
        assert_eq!(replayed(&reopened), vec![record(1, "a")]);
        assert_eq!(torn.data().len(), good_len);
    }

    #[test]
    fn bad_checksum_on_last_frame_is_torn() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        log.append(&record(1, "a")).unwrap();
        log.append(&record(2, "b")).unwrap();

        let mut bytes = backend.data();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;

        let reopened = CommitLog::new(Box::new(InMemoryBackend::with_data(bytes)), true);
        assert_eq!(replayed(&reopened), vec![record(1, "a")]);
    }

    #[test]
    fn damaged_length_is_corruption_not_torn_tail() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        for (seq, name) in [(1, "a"), (2, "b"), (3, "c")] {
            log.append(&record(seq, name)).unwrap();
        }

        let mut bytes = backend.data();
        let before = bytes.len();
        // High byte of the first frame's length field.
        bytes[9] ^= 0x01;

        let damaged = InMemoryBackend::with_data(bytes);
        let reopened = CommitLog::new(Box::new(damaged.clone()), true);
        assert!(matches!(
            reopened.replay(),
            Err(CoreError::LogCorruption { offset: 0, .. })
        ));
        assert_eq!(damaged.data().len(), before);
    }

    #[test]
    fn short_header_at_tail_is_torn() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        log.append(&record(1, "a")).unwrap();
        let good_len = backend.data().len();

        let frame = record(2, "b").encode_frame().unwrap();
        let mut bytes = backend.data();
        bytes.extend_from_slice(&frame[..HEADER_SIZE - 1]);

        let torn = InMemoryBackend::with_data(bytes);
        let reopened = CommitLog::new(Box::new(torn.clone()), true);
        assert_eq!(replayed(&reopened), vec![record(1, "a")]);
        assert_eq!(torn.data().len(), good_len);
    }

    #[test]
    fn bad_checksum_mid_log_is_corruption() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        log.append(&record(1, "a")).unwrap();
        log.append(&record(2, "b")).unwrap();

        let mut bytes = backend.data();
        bytes[HEADER_SIZE + 1] ^= 0x55;

        let reopened = CommitLog::new(Box::new(InMemoryBackend::with_data(bytes)), true);
        assert!(matches!(
            reopened.replay(),
            Err(CoreError::LogCorruption { offset: 0, .. })
        ));
    }
}
