//! On-directory format of partitions and the store status record.
//!
//! Both records share one frame:
//!
//! ```text
//! magic:   [u8; 4]   "PIDX" (partition) or "PSTA" (status)
//! version: u8
//! crc32:   u32 LE    checksum of the body
//! body:    CBOR
//! ```
//!
//! A partition body is `{ seq, postings: [(value, [entity])] }` with postings
//! in value order.

use crate::error::{IndexError, IndexResult};
use crate::register::IndexSample;
use crate::store::partition::PartitionSnapshot;
use crate::types::EntityId;
use crate::value::PropertyValue;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const PARTITION_MAGIC: [u8; 4] = *b"PIDX";
const STATUS_MAGIC: [u8; 4] = *b"PSTA";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4;

#[derive(Serialize, Deserialize)]
struct PartitionBody {
    seq: u32,
    postings: Vec<(PropertyValue, Vec<EntityId>)>,
}

/// Lifecycle state recorded for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreState {
    /// Population has started but not been committed.
    Populating,
    /// Population was committed; the index may serve queries.
    Online,
}

/// The persisted status of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Lifecycle state.
    pub state: StoreState,
    /// Sample taken when the index was committed.
    pub sample: Option<IndexSample>,
}

impl StoreStatus {
    /// Status of an index under population.
    #[must_use]
    pub fn populating() -> Self {
        Self {
            state: StoreState::Populating,
            sample: None,
        }
    }

    /// Status of a committed index.
    #[must_use]
    pub fn online(sample: IndexSample) -> Self {
        Self {
            state: StoreState::Online,
            sample: Some(sample),
        }
    }

    /// Returns true if the index was committed.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state == StoreState::Online
    }
}

fn encode_framed<T: Serialize>(magic: [u8; 4], body: &T) -> IndexResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(body, &mut payload).map_err(|e| IndexError::codec(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&magic);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode_framed<T: DeserializeOwned>(magic: [u8; 4], data: &[u8]) -> IndexResult<T> {
    if data.len() < HEADER_LEN {
        return Err(IndexError::codec(format!(
            "record too short: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != magic {
        return Err(IndexError::codec("bad magic"));
    }
    if data[4] != FORMAT_VERSION {
        return Err(IndexError::codec(format!(
            "unsupported format version {}",
            data[4]
        )));
    }

    let expected = u32::from_le_bytes([data[5], data[6], data[7], data[8]]);
    let payload = &data[HEADER_LEN..];
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(IndexError::codec(format!(
            "checksum mismatch: expected {expected:08x}, got {actual:08x}"
        )));
    }

    ciborium::from_reader(payload).map_err(|e| IndexError::codec(e.to_string()))
}

/// Encodes a partition snapshot.
pub(crate) fn encode_partition(snapshot: &PartitionSnapshot) -> IndexResult<Vec<u8>> {
    let body = PartitionBody {
        seq: snapshot.seq(),
        postings: snapshot
            .postings()
            .iter()
            .map(|(value, entities)| (value.clone(), entities.clone()))
            .collect(),
    };
    encode_framed(PARTITION_MAGIC, &body)
}

/// Decodes a partition snapshot, checking it belongs to partition `seq`.
pub(crate) fn decode_partition(seq: u32, data: &[u8]) -> IndexResult<PartitionSnapshot> {
    let body: PartitionBody = decode_framed(PARTITION_MAGIC, data)?;
    if body.seq != seq {
        return Err(IndexError::codec(format!(
            "partition file {seq} holds partition {}",
            body.seq
        )));
    }
    Ok(PartitionSnapshot::from_postings(seq, body.postings))
}

/// Encodes a status record.
pub(crate) fn encode_status(status: &StoreStatus) -> IndexResult<Vec<u8>> {
    encode_framed(STATUS_MAGIC, status)
}

/// Decodes a status record.
pub(crate) fn decode_status(data: &[u8]) -> IndexResult<StoreStatus> {
    decode_framed(STATUS_MAGIC, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::partition::PostingOp;

    fn sample_partition() -> PartitionSnapshot {
        PartitionSnapshot::empty(2).apply(&[
            PostingOp::Insert(PropertyValue::from("foo"), EntityId::new(1)),
            PostingOp::Insert(PropertyValue::from(3.5), EntityId::new(2)),
            PostingOp::Insert(PropertyValue::Bytes(vec![0, 1]), EntityId::new(42)),
        ])
    }

    #[test]
    fn partition_survives_encoding() {
        let snapshot = sample_partition();
        let bytes = encode_partition(&snapshot).unwrap();
        assert_eq!(&bytes[0..4], b"PIDX");
        assert_eq!(decode_partition(2, &bytes).unwrap(), snapshot);
    }

    #[test]
    fn partition_seq_mismatch_rejected() {
        let bytes = encode_partition(&sample_partition()).unwrap();
        assert!(matches!(
            decode_partition(5, &bytes),
            Err(IndexError::Codec { .. })
        ));
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut bytes = encode_partition(&sample_partition()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode_partition(2, &bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn truncated_and_foreign_records_rejected() {
        assert!(decode_partition(0, b"PID").is_err());

        let status = encode_status(&StoreStatus::populating()).unwrap();
        let err = decode_partition(0, &status).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn status_survives_encoding() {
        let status = StoreStatus::online(IndexSample::new(3, 2, 3));
        let decoded = decode_status(&encode_status(&status).unwrap()).unwrap();
        assert!(decoded.is_online());
        assert_eq!(decoded, status);
    }
}
