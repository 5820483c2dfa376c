//! Binary state decoding
//!
//! Distribution lists are posted on-chain as a single snappy frame stream
//! wrapping a length-prefixed binary record:
//!
//! ```text
//! u64 LE  epoch count
//! per epoch:
//!   u64 LE  epoch
//!   u64 LE  task count
//!   per task:
//!     u32 LE len + UTF-8 task id
//!     u32 LE len + JSON string (NUL padding allowed)
//! ```
//!
//! Older leaders wrote plain JSON of the form `{"<round>": {"<taskId>": [bytes]}}`;
//! [`decode_distribution`] falls back to that layout when the binary path
//! yields nothing.

use crate::error::{DecodeError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Decoded account state: `epoch -> taskId -> parsed leaf`
pub type AccountState = BTreeMap<u64, BTreeMap<String, Value>>;

/// Decompress a snappy frame stream
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = snap::read::FrameDecoder::new(blob);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;
    Ok(raw)
}

/// Compress into a snappy frame stream
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = snap::write::FrameEncoder::new(Vec::new());
    encoder
        .write_all(raw)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;
    encoder
        .into_inner()
        .map_err(|e| DecodeError::Decompression(e.to_string()))
}

/// Read cursor over the decompressed record. Tracks position for error reporting.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                field: field.to_string(),
                needed: n,
                offset: self.pos,
                available: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_fixed<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N, field)?);
        Ok(arr)
    }

    fn read_u32(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_fixed::<4>(field)?))
    }

    fn read_u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_fixed::<8>(field)?))
    }

    /// `u32 LE length` + raw bytes
    fn read_bytes(&mut self, field: &str) -> Result<&'a [u8]> {
        let len = self.read_u32(field)? as usize;
        self.take(len, field)
    }

    fn read_string(&mut self, field: &str) -> Result<String> {
        let bytes = self.read_bytes(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::Utf8(field.to_string()))
    }

    /// Map entry count, bounded by what could possibly fit in the remaining bytes
    fn read_count(&mut self, field: &str, min_entry_len: usize) -> Result<usize> {
        let count = self.read_u64(field)?;
        let max = (self.remaining() / min_entry_len) as u64;
        if count > max {
            return Err(DecodeError::Truncated {
                field: field.to_string(),
                needed: (count as usize).saturating_mul(min_entry_len),
                offset: self.pos,
                available: self.data.len(),
            });
        }
        Ok(count as usize)
    }
}

fn parse_leaf(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(trim_at_nul(bytes))
        .map_err(|_| DecodeError::Utf8("leaf".to_string()))?;
    serde_json::from_str(text).map_err(|e| DecodeError::LeafJson(e.to_string()))
}

fn trim_at_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Decode an uncompressed binary record
pub fn decode_record(raw: &[u8]) -> Result<AccountState> {
    let mut cursor = Cursor::new(raw);
    let mut state = AccountState::new();

    // epoch (8) + task count (8)
    let epochs = cursor.read_count("epoch_count", 16)?;
    for _ in 0..epochs {
        let epoch = cursor.read_u64("epoch")?;
        // task id length (4) + leaf length (4)
        let tasks = cursor.read_count("task_count", 8)?;

        let entry = state.entry(epoch).or_default();
        for _ in 0..tasks {
            let task_id = cursor.read_string("task_id")?;
            let leaf = parse_leaf(cursor.read_bytes("leaf")?)?;
            entry.insert(task_id, leaf);
        }
    }

    if cursor.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(cursor.remaining()));
    }

    Ok(state)
}

/// Encode `epoch -> taskId -> value` into the binary record (uncompressed)
pub fn encode_record(state: &AccountState) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(state.len() as u64).to_le_bytes());
    for (epoch, tasks) in state {
        buf.extend_from_slice(&epoch.to_le_bytes());
        buf.extend_from_slice(&(tasks.len() as u64).to_le_bytes());
        for (task_id, value) in tasks {
            write_bytes(&mut buf, task_id.as_bytes());
            write_bytes(&mut buf, value.to_string().as_bytes());
        }
    }
    buf
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

/// Decompress then decode an account blob
pub fn decode_state(blob: &[u8]) -> Result<AccountState> {
    decode_record(&decompress(blob)?)
}

/// Compress an encoded record, the inverse of [`decode_state`]
pub fn encode_state(state: &AccountState) -> Result<Vec<u8>> {
    compress(&encode_record(state))
}

/// Plain JSON view `{epoch: {taskId: value}}` of a decoded state
pub fn to_json(state: &AccountState) -> Value {
    let mut outer = Map::new();
    for (epoch, tasks) in state {
        let inner: Map<String, Value> = tasks
            .iter()
            .map(|(task_id, value)| (task_id.clone(), value.clone()))
            .collect();
        outer.insert(epoch.to_string(), Value::Object(inner));
    }
    Value::Object(outer)
}

fn leaf_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Binary path: `structure[round][taskId]`
pub fn extract_binary(blob: &[u8], round: u64, task_id: &str) -> Result<Option<String>> {
    let state = decode_state(blob)?;
    Ok(state
        .get(&round)
        .and_then(|tasks| tasks.get(task_id))
        .map(leaf_to_string))
}

/// Legacy path: plain JSON with a byte-array leaf, trimmed at the first NUL
pub fn extract_legacy(blob: &[u8], round: u64, task_id: &str) -> Result<Option<String>> {
    let root: Value =
        serde_json::from_slice(trim_at_nul(blob)).map_err(|e| DecodeError::Legacy(e.to_string()))?;

    let Some(leaf) = root.get(round.to_string()).and_then(|r| r.get(task_id)) else {
        return Ok(None);
    };

    let bytes: Vec<u8> = match leaf {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| DecodeError::Legacy("leaf array holds a non-byte".to_string()))
            })
            .collect::<Result<_>>()?,
        Value::String(s) => s.as_bytes().to_vec(),
        other => return Err(DecodeError::Legacy(format!("unexpected leaf {}", other))),
    };

    let text = String::from_utf8(trim_at_nul(&bytes).to_vec())
        .map_err(|_| DecodeError::Utf8("legacy leaf".to_string()))?;
    Ok(Some(text))
}

/// Recover the raw distribution list string for `(round, task_id)`.
///
/// Tries the binary path, then the legacy JSON path. Both failing is "no
/// data"; errors are logged and never surfaced.
pub fn decode_distribution(blob: &[u8], round: u64, task_id: &str) -> Option<String> {
    match extract_binary(blob, round, task_id) {
        Ok(Some(list)) => return Some(list),
        Ok(None) => debug!(round, task_id, "Binary state has no entry, trying legacy layout"),
        Err(e) => debug!(round, task_id, error = %e, "Binary decode failed, trying legacy layout"),
    }

    match extract_legacy(blob, round, task_id) {
        Ok(Some(list)) => Some(list),
        Ok(None) => {
            debug!(round, task_id, "Legacy layout has no entry");
            None
        }
        Err(e) => {
            warn!(round, task_id, error = %e, "Distribution list undecodable");
            None
        }
    }
}
