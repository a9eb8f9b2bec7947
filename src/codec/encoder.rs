//! Indexed document encoder.
//!
//! The encoded buffer layout is (all integers little-endian):
//!
//! ```text
//! +------------------+
//! | Magic 0xD1C7     | (u16)
//! +------------------+
//! | Entry count      | (u16)
//! +------------------+
//! | count x entries: |
//! |   key hash       | (u16)
//! |   offset         | (u16)
//! +------------------+
//! | JSON payload     | ({"key":value,...})
//! +------------------+
//! ```
//!
//! Offsets are relative to the start of the payload region and point at the
//! opening quote of the entry's `"key":value` pair. Entries are emitted in
//! ascending hash order so readers can binary-search; pairs appear in the
//! payload in the order the keys were encountered.

use serde_json::{Map, Value};

use super::errors::EncodingError;
use super::hash::index_hash;

/// Magic number identifying an indexed document buffer.
pub const MAGIC: u16 = 0xD1C7;

/// Size of the fixed header (magic + entry count).
pub const HEADER_SIZE: usize = 4;

/// Size of one index entry (hash + offset).
pub const ENTRY_SIZE: usize = 4;

/// Encodes a property map into an indexed binary buffer.
///
/// Fails if the map has more keys than a 16-bit count can describe, or if
/// any pair would start past the 16-bit offset limit.
pub fn encode(properties: &Map<String, Value>) -> Result<Vec<u8>, EncodingError> {
    if properties.len() > u16::MAX as usize {
        return Err(EncodingError::TooManyKeys {
            count: properties.len(),
        });
    }

    let mut payload: Vec<u8> = Vec::new();
    let mut entries: Vec<(u16, u16)> = Vec::with_capacity(properties.len());

    payload.push(b'{');
    let mut first = true;
    for (key, value) in properties {
        if !first {
            payload.push(b',');
        }
        first = false;

        let offset = payload.len();
        if offset > u16::MAX as usize {
            return Err(EncodingError::TooLarge { offset });
        }
        entries.push((index_hash(key), offset as u16));

        let key_json = serde_json::to_vec(key).map_err(|e| EncodingError::Unrepresentable {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        payload.extend_from_slice(&key_json);
        payload.push(b':');
        let value_json =
            serde_json::to_vec(value).map_err(|e| EncodingError::Unrepresentable {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        payload.extend_from_slice(&value_json);
    }
    payload.push(b'}');

    // Readers binary-search on the hash; ties keep payload order so the
    // output is fully deterministic.
    entries.sort_by_key(|&(hash, offset)| (hash, offset));

    let mut out = Vec::with_capacity(HEADER_SIZE + entries.len() * ENTRY_SIZE + payload.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (hash, offset) in entries {
        out.extend_from_slice(&hash.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&payload);
    Ok(out)
}
