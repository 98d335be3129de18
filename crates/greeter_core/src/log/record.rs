//! Commit record types and framing.
//!
//! ```text
//! | magic "GRLG" (4) | version u16 (2) | len u32 (4) | header crc32 (4) | CBOR payload (len) | crc32 (4) |
//! ```
//!
//! The header CRC covers magic, version and length, so a length read back
//! from a complete header can be trusted. The trailing CRC covers everything
//! before it. All integers are little-endian.

use crate::entry::RegistryEntry;
use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId, View};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every commit record.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"GRLG";

/// Current commit log format version.
pub(crate) const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_FIELDS_SIZE: usize = 10;

/// Header fields plus their CRC.
pub(crate) const HEADER_SIZE: usize = HEADER_FIELDS_SIZE + CRC_SIZE;

pub(crate) const CRC_SIZE: usize = 4;

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// The registry root was created in a view.
    CreateRoot {
        /// The view that got its root.
        view: View,
    },
    /// An entry was written.
    Put {
        /// Target view.
        view: View,
        /// The new entry.
        entry: RegistryEntry,
    },
}

/// All mutations of one committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    sequence: u64,
    txid: u64,
    ops: Vec<LogOp>,
}

impl CommitRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(sequence: SequenceNumber, txid: TransactionId, ops: Vec<LogOp>) -> Self {
        Self {
            sequence: sequence.as_u64(),
            txid: txid.as_u64(),
            ops,
        }
    }

    /// Sequence number the commit was applied at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.sequence)
    }

    /// The committing transaction.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        TransactionId::new(self.txid)
    }

    /// The logged mutations, in apply order.
    #[must_use]
    pub fn ops(&self) -> &[LogOp] {
        &self.ops
    }

    /// Encodes the record into a complete frame.
    pub(crate) fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload).map_err(|e| CoreError::codec(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::codec("commit record payload exceeds 4 GiB"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        let header_crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&header_crc.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a CBOR payload taken out of a frame at `offset`.
    pub(crate) fn decode_payload(offset: u64, payload: &[u8]) -> CoreResult<Self> {
        ciborium::from_reader(payload)
            .map_err(|e| CoreError::log_corruption(offset, format!("undecodable record: {e}")))
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub payload_len: usize,
}

impl FrameHeader {
    /// Total length of the frame this header opens.
    pub(crate) fn frame_len(self) -> u64 {
        (HEADER_SIZE + self.payload_len + CRC_SIZE) as u64
    }

    pub(crate) fn parse(offset: u64, header: &[u8]) -> CoreResult<Self> {
        if header.len() < HEADER_SIZE || header[..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(offset, "bad record magic"));
        }
        let (fields, crc) = header[..HEADER_SIZE].split_at(HEADER_FIELDS_SIZE);
        if crc32fast::hash(fields) != u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) {
            return Err(CoreError::log_corruption(offset, "header checksum mismatch"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != LOG_VERSION {
            return Err(CoreError::log_corruption(
                offset,
                format!("unsupported log version {version}"),
            ));
        }
        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
        Ok(Self {
            payload_len: len as usize,
        })
    }
}

/// Checks the CRC of a frame, given its header and the bytes after it
/// (`payload ++ crc`).
pub(crate) fn checksum_matches(header: &[u8], body: &[u8]) -> bool {
    let Some(split) = body.len().checked_sub(CRC_SIZE) else {
        return false;
    };
    let (payload, crc_bytes) = body.split_at(split);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(header);
    hasher.update(payload);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    hasher.finalize() == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommitRecord {
        CommitRecord::new(
            SequenceNumber::new(3),
            TransactionId::new(11),
            vec![
                LogOp::CreateRoot {
                    view: View::Operational,
                },
                LogOp::Put {
                    view: View::Operational,
                    entry: RegistryEntry::new("bla bla bla", "Hello bla bla bla").unwrap(),
                },
            ],
        )
    }

    #[test]
    fn frame_layout() {
        let frame = sample().encode_frame().unwrap();
        assert_eq!(&frame[..4], b"GRLG");
        let header = FrameHeader::parse(0, &frame[..HEADER_SIZE]).unwrap();
        assert_eq!(header.frame_len(), frame.len() as u64);
        assert!(checksum_matches(&frame[..HEADER_SIZE], &frame[HEADER_SIZE..]));
    }

    #[test]
    fn payload_decodes_to_same_record() {
        let record = sample();
        let frame = record.encode_frame().unwrap();
        let payload = &frame[HEADER_SIZE..frame.len() - CRC_SIZE];
        assert_eq!(CommitRecord::decode_payload(0, payload).unwrap(), record);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut frame = sample().encode_frame().unwrap();
        let mid = HEADER_SIZE + 2;
        frame[mid] ^= 0xFF;
        assert!(!checksum_matches(&frame[..HEADER_SIZE], &frame[HEADER_SIZE..]));
    }

    #[test]
    fn bad_magic_and_header_rejected() {
        let mut frame = sample().encode_frame().unwrap();
        frame[0] = b'X';
        assert!(matches!(
            FrameHeader::parse(40, &frame[..HEADER_SIZE]),
            Err(CoreError::LogCorruption { offset: 40, .. })
        ));

        let mut frame = sample().encode_frame().unwrap();
        frame[4] = 9;
        let err = FrameHeader::parse(0, &frame[..HEADER_SIZE]).unwrap_err();
        assert!(err.to_string().contains("header checksum mismatch"));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut frame = sample().encode_frame().unwrap();
        frame[4] = 9;
        let crc = crc32fast::hash(&frame[..HEADER_FIELDS_SIZE]);
        frame[HEADER_FIELDS_SIZE..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());

        let err = FrameHeader::parse(0, &frame[..HEADER_SIZE]).unwrap_err();
        assert!(err.to_string().contains("unsupported log version 9"));
    }

    #[test]
    fn damaged_length_fails_header_checksum() {
        let mut frame = sample().encode_frame().unwrap();
        frame[9] ^= 0x01;
        assert!(matches!(
            FrameHeader::parse(7, &frame[..HEADER_SIZE]),
            Err(CoreError::LogCorruption { offset: 7, .. })
        ));
    }
}
