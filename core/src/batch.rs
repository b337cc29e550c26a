use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::Result;

/// Maps a message field name to the column index it is read from in a
/// source record.
pub type FieldMap = BTreeMap<String, usize>;

/// One synthetic unit of load. `msg_id` is the identity used to correlate
/// the message with downstream execution logs; it is never reused within a
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: u64,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// Produced atomically by one producer step and owned by exactly one
/// consumer worker.
#[derive(Debug, Clone)]
pub struct Batch {
    pub start_index: u64,
    pub messages: Vec<Message>,
}

/// Serialized message ready for the ingestion sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub payload: Vec<u8>,
    pub partition_key: String,
}

/// Builds the messages for one claimed index range.
///
/// Without a record source, synthesizes `size` messages carrying only
/// sequential ids. With a source and field map, slices
/// `records[start..start + size]` and merges the mapped fields into each
/// message. An exhausted source yields a shorter slice, never an error; the
/// producer checks bounds before claiming so short batches are not enqueued.
pub fn build_messages(
    records: Option<&[Vec<String>]>,
    start: u64,
    size: usize,
    field_map: Option<&FieldMap>,
) -> Vec<Message> {
    match (records, field_map) {
        (Some(records), Some(map)) => {
            let lo = (start as usize).min(records.len());
            let hi = lo.saturating_add(size).min(records.len());
            records[lo..hi]
                .iter()
                .enumerate()
                .map(|(offset, record)| {
                    let fields = map
                        .iter()
                        .filter_map(|(name, &idx)| {
                            record.get(idx).map(|value| (name.clone(), value.clone()))
                        })
                        .collect();
                    Message {
                        msg_id: start + offset as u64,
                        fields,
                    }
                })
                .collect()
        }
        _ => (start..start + size as u64)
            .map(|msg_id| Message {
                msg_id,
                fields: BTreeMap::new(),
            })
            .collect(),
    }
}

impl Message {
    /// Serializes the message and picks its partition key: the configured
    /// partition field when present on the message, `msg_id` otherwise.
    pub fn to_stream_record(&self, partition_field: Option<&str>) -> Result<StreamRecord> {
        let partition_key = partition_field
            .and_then(|field| self.fields.get(field).cloned())
            .unwrap_or_else(|| self.msg_id.to_string());
        let payload = serde_json::to_vec(self)?;
        Ok(StreamRecord {
            payload,
            partition_key,
        })
    }
}
