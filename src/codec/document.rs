//! Read view over an encoded document buffer.
//!
//! `IndexedDocument` resolves single keys against the hash index without
//! parsing the rest of the payload. Buffers whose magic does not match are
//! accepted as plain JSON and parsed generically up front, so callers can
//! hand either representation to the same type.
//!
//! The optional value cache makes repeated lookups of the same key cheap.
//! It uses interior mutability, so an `IndexedDocument` with caching enabled
//! is not `Sync`; sharing one instance across threads requires external
//! synchronization. Distinct instances share nothing.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};

use super::encoder::{ENTRY_SIZE, HEADER_SIZE, MAGIC};
use super::errors::FormatError;
use super::hash::index_hash;

/// Result of the fast header check on a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// Magic matches and the declared index fits the buffer.
    Indexed,
    /// Magic does not match; the buffer is treated as plain JSON.
    PlainJson,
    /// Magic matches but the declared index overruns the buffer,
    /// or the buffer is empty.
    Invalid,
}

/// Classifies a buffer from its header alone, without parsing the payload.
pub fn classify(data: &[u8]) -> BufferKind {
    if data.is_empty() {
        return BufferKind::Invalid;
    }
    if data.len() < HEADER_SIZE {
        return BufferKind::PlainJson;
    }
    if u16::from_le_bytes([data[0], data[1]]) != MAGIC {
        return BufferKind::PlainJson;
    }
    let count = u16::from_le_bytes([data[2], data[3]]) as usize;
    if HEADER_SIZE + count * ENTRY_SIZE <= data.len() {
        BufferKind::Indexed
    } else {
        BufferKind::Invalid
    }
}

/// Returns true if the buffer carries a well-formed index header.
pub fn is_valid_indexed(data: &[u8]) -> bool {
    classify(data) == BufferKind::Indexed
}

/// Strips the index from a buffer, returning the plain JSON payload.
///
/// Plain JSON buffers are returned unchanged.
pub fn strip_index(data: &[u8]) -> Result<&[u8], FormatError> {
    match classify(data) {
        BufferKind::Indexed => {
            let count = u16::from_le_bytes([data[2], data[3]]) as usize;
            Ok(&data[HEADER_SIZE + count * ENTRY_SIZE..])
        }
        BufferKind::PlainJson => Ok(data),
        BufferKind::Invalid => Err(invalid_buffer_error(data)),
    }
}

fn invalid_buffer_error(data: &[u8]) -> FormatError {
    if data.len() < HEADER_SIZE {
        FormatError::TruncatedHeader { len: data.len() }
    } else {
        FormatError::TruncatedIndex {
            count: u16::from_le_bytes([data[2], data[3]]) as usize,
            len: data.len(),
        }
    }
}

#[derive(Debug)]
enum Repr {
    /// Hash-indexed buffer; lookups resolve through the index.
    Indexed { count: usize, payload_start: usize },
    /// Plain JSON buffer, parsed eagerly at construction.
    Plain(Map<String, Value>),
}

/// Outcome of probing the hash index for one key.
enum Probe {
    /// Key confirmed; the value's JSON starts at this payload offset.
    Found { value_pos: usize },
    /// At least one entry shared the hash but none matched the key text.
    CollisionOnly,
    /// No entry carries the key's hash.
    Absent,
}

/// A document body read directly from its encoded buffer.
///
/// Construction validates the header only; values are parsed on demand.
/// Overlay entries supplied at construction take precedence over (and hide)
/// indexed entries with the same key, without rewriting the buffer.
#[derive(Debug)]
pub struct IndexedDocument {
    data: Vec<u8>,
    repr: Repr,
    overlay: Map<String, Value>,
    cache: Option<RefCell<HashMap<String, Value>>>,
}

impl IndexedDocument {
    /// Wraps an encoded buffer (indexed or plain JSON).
    ///
    /// * `overlay` - optional key/value entries that shadow the buffer's own.
    /// * `cache_values` - when true, a decoded value is cached and reused on
    ///   later lookups of the same key. Purely a performance knob.
    pub fn new(
        data: Vec<u8>,
        overlay: Option<Map<String, Value>>,
        cache_values: bool,
    ) -> Result<Self, FormatError> {
        let repr = match classify(&data) {
            BufferKind::Indexed => {
                let count = u16::from_le_bytes([data[2], data[3]]) as usize;
                Repr::Indexed {
                    count,
                    payload_start: HEADER_SIZE + count * ENTRY_SIZE,
                }
            }
            BufferKind::PlainJson => {
                let value: Value = serde_json::from_slice(&data)?;
                match value {
                    Value::Object(map) => Repr::Plain(map),
                    _ => return Err(FormatError::NotAnObject),
                }
            }
            BufferKind::Invalid => return Err(invalid_buffer_error(&data)),
        };
        Ok(Self {
            data,
            repr,
            overlay: overlay.unwrap_or_default(),
            cache: if cache_values {
                Some(RefCell::new(HashMap::new()))
            } else {
                None
            },
        })
    }

    /// The encoded bytes this view was created from.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// The plain JSON payload region (the whole buffer for plain JSON).
    pub fn json_payload(&self) -> &[u8] {
        match &self.repr {
            Repr::Indexed { payload_start, .. } => &self.data[*payload_start..],
            Repr::Plain(_) => &self.data,
        }
    }

    /// Number of index entries; zero for plain JSON buffers.
    pub fn index_entry_count(&self) -> usize {
        match &self.repr {
            Repr::Indexed { count, .. } => *count,
            Repr::Plain(_) => 0,
        }
    }

    /// Looks up one key, decoding only that key's value.
    ///
    /// Overlay entries win over indexed entries. Returns `Ok(None)` for an
    /// absent key; errors mean the buffer itself is malformed.
    pub fn get(&self, key: &str) -> Result<Option<Value>, FormatError> {
        if let Some(value) = self.overlay.get(key) {
            return Ok(Some(value.clone()));
        }
        if let Repr::Plain(map) = &self.repr {
            return Ok(map.get(key).cloned());
        }
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.borrow().get(key) {
                return Ok(Some(value.clone()));
            }
        }
        let payload = self.json_payload();
        let value = match self.probe(key)? {
            Probe::Found { value_pos } => Some(self.value_at(payload, value_pos)?),
            // A colliding bucket with no confirmed key falls back to a
            // full payload scan rather than trusting the index.
            Probe::CollisionOnly => self.parse_payload()?.get(key).cloned(),
            Probe::Absent => None,
        };
        if let (Some(cache), Some(value)) = (&self.cache, &value) {
            cache.borrow_mut().insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Returns true if the key resolves, without parsing its value bytes.
    pub fn contains_key(&self, key: &str) -> Result<bool, FormatError> {
        if self.overlay.contains_key(key) {
            return Ok(true);
        }
        match &self.repr {
            Repr::Plain(map) => Ok(map.contains_key(key)),
            Repr::Indexed { .. } => match self.probe(key)? {
                Probe::Found { .. } => Ok(true),
                Probe::CollisionOnly => Ok(self.parse_payload()?.contains_key(key)),
                Probe::Absent => Ok(false),
            },
        }
    }

    /// Fully decodes the document, overlay entries applied on top.
    pub fn to_map(&self) -> Result<Map<String, Value>, FormatError> {
        let mut map = match &self.repr {
            Repr::Plain(map) => map.clone(),
            Repr::Indexed { .. } => self.parse_payload()?,
        };
        for (key, value) in &self.overlay {
            map.insert(key.clone(), value.clone());
        }
        Ok(map)
    }

    fn entry(&self, i: usize) -> (u16, u16) {
        let at = HEADER_SIZE + i * ENTRY_SIZE;
        (
            u16::from_le_bytes([self.data[at], self.data[at + 1]]),
            u16::from_le_bytes([self.data[at + 2], self.data[at + 3]]),
        )
    }

    /// Binary-searches the sorted index for `key`, confirming the key text
    /// at each entry offset since 16-bit hashes collide.
    fn probe(&self, key: &str) -> Result<Probe, FormatError> {
        let count = match &self.repr {
            Repr::Indexed { count, .. } => *count,
            Repr::Plain(_) => return Ok(Probe::Absent),
        };
        let payload = self.json_payload();
        let hash = index_hash(key);

        // Lower bound of the hash's bucket.
        let mut lo = 0;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.entry(mid).0 < hash {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut saw_hash = false;
        for i in lo..count {
            let (entry_hash, offset) = self.entry(i);
            if entry_hash != hash {
                break;
            }
            saw_hash = true;
            let (entry_key, key_end) = self.key_at(payload, offset as usize)?;
            if entry_key == key {
                return Ok(Probe::Found {
                    value_pos: self.separator_end(payload, key_end)?,
                });
            }
        }
        if saw_hash {
            Ok(Probe::CollisionOnly)
        } else {
            Ok(Probe::Absent)
        }
    }

    /// Reads the JSON string at `offset`, returning it and the offset just
    /// past its closing quote.
    fn key_at(&self, payload: &[u8], offset: usize) -> Result<(String, usize), FormatError> {
        if offset >= payload.len() {
            return Err(FormatError::OffsetOutOfBounds {
                offset,
                payload_len: payload.len(),
            });
        }
        let mut stream =
            serde_json::Deserializer::from_slice(&payload[offset..]).into_iter::<String>();
        match stream.next() {
            Some(Ok(key)) => {
                let end = offset + stream.byte_offset();
                Ok((key, end))
            }
            Some(Err(e)) => Err(FormatError::InvalidPayload(e)),
            None => Err(FormatError::MalformedPair { offset }),
        }
    }

    /// Skips the `:` separator after a key, returning the value's offset.
    fn separator_end(&self, payload: &[u8], mut pos: usize) -> Result<usize, FormatError> {
        let start = pos;
        while pos < payload.len() && payload[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= payload.len() || payload[pos] != b':' {
            return Err(FormatError::MalformedPair { offset: start });
        }
        Ok(pos + 1)
    }

    /// Parses exactly one JSON value starting at `pos`.
    fn value_at(&self, payload: &[u8], pos: usize) -> Result<Value, FormatError> {
        if pos >= payload.len() {
            return Err(FormatError::MalformedPair { offset: pos });
        }
        let mut stream =
            serde_json::Deserializer::from_slice(&payload[pos..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(FormatError::InvalidPayload(e)),
            None => Err(FormatError::MalformedPair { offset: pos }),
        }
    }

    fn parse_payload(&self) -> Result<Map<String, Value>, FormatError> {
        let value: Value = serde_json::from_slice(self.json_payload())?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(FormatError::NotAnObject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::encoder::encode;
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn doc(value: Value) -> IndexedDocument {
        let encoded = encode(&as_map(value)).unwrap();
        IndexedDocument::new(encoded, None, false).unwrap()
    }

    #[test]
    fn test_get_single_key() {
        let doc = doc(json!({"a": 1, "b": "x", "nested": {"deep": [1, 2, 3]}}));
        assert_eq!(doc.get("a").unwrap(), Some(json!(1)));
        assert_eq!(doc.get("b").unwrap(), Some(json!("x")));
        assert_eq!(doc.get("nested").unwrap(), Some(json!({"deep": [1, 2, 3]})));
        assert_eq!(doc.get("missing").unwrap(), None);
    }

    #[test]
    fn test_contains_key() {
        let doc = doc(json!({"a": 1, "b": "x"}));
        assert!(doc.contains_key("a").unwrap());
        assert!(doc.contains_key("b").unwrap());
        assert!(!doc.contains_key("c").unwrap());
    }

    #[test]
    fn test_plain_json_fallback() {
        let raw = br#"{"plain": true, "n": 7}"#.to_vec();
        assert_eq!(classify(&raw), BufferKind::PlainJson);
        let doc = IndexedDocument::new(raw, None, false).unwrap();
        assert_eq!(doc.get("plain").unwrap(), Some(json!(true)));
        assert_eq!(doc.get("n").unwrap(), Some(json!(7)));
        assert_eq!(doc.index_entry_count(), 0);
    }

    #[test]
    fn test_plain_json_non_object_rejected() {
        let raw = b"[1, 2, 3]".to_vec();
        let err = IndexedDocument::new(raw, None, false).unwrap_err();
        assert!(matches!(err, FormatError::NotAnObject));
    }

    #[test]
    fn test_overlay_shadows_indexed_entry() {
        let encoded = encode(&as_map(json!({"a": 1, "b": 2}))).unwrap();
        let overlay = as_map(json!({"a": "shadowed", "extra": true}));
        let doc = IndexedDocument::new(encoded, Some(overlay), false).unwrap();

        assert_eq!(doc.get("a").unwrap(), Some(json!("shadowed")));
        assert_eq!(doc.get("b").unwrap(), Some(json!(2)));
        assert_eq!(doc.get("extra").unwrap(), Some(json!(true)));
        assert!(doc.contains_key("extra").unwrap());

        let map = doc.to_map().unwrap();
        assert_eq!(map.get("a"), Some(&json!("shadowed")));
        assert_eq!(map.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn test_cached_lookup_returns_same_value() {
        let encoded = encode(&as_map(json!({"k": [1, 2, 3]}))).unwrap();
        let doc = IndexedDocument::new(encoded, None, true).unwrap();
        let first = doc.get("k").unwrap();
        let second = doc.get("k").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_classify_invalid_when_index_overruns() {
        // Magic is right but the header claims more entries than fit.
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC.to_le_bytes());
        data.extend_from_slice(&100u16.to_le_bytes());
        data.extend_from_slice(b"{}");
        assert_eq!(classify(&data), BufferKind::Invalid);
        assert!(IndexedDocument::new(data, None, false).is_err());
    }

    #[test]
    fn test_classify_empty_buffer_invalid() {
        assert_eq!(classify(&[]), BufferKind::Invalid);
    }

    #[test]
    fn test_strip_index_yields_payload() {
        let map = as_map(json!({"a": 1, "b": "x"}));
        let encoded = encode(&map).unwrap();
        let stripped = strip_index(&encoded).unwrap();
        let parsed: Value = serde_json::from_slice(stripped).unwrap();
        assert_eq!(parsed, Value::Object(map));

        let plain = br#"{"a": 1}"#;
        assert_eq!(strip_index(plain).unwrap(), &plain[..]);
    }

    #[test]
    fn test_out_of_bounds_offset_is_fatal() {
        // Hand-build a buffer whose single entry points past the payload.
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&index_hash("a").to_le_bytes());
        data.extend_from_slice(&500u16.to_le_bytes());
        data.extend_from_slice(b"{\"a\":1}");

        let doc = IndexedDocument::new(data, None, false).unwrap();
        let err = doc.get("a").unwrap_err();
        assert!(matches!(err, FormatError::OffsetOutOfBounds { .. }));
    }
}
