//! Codec error types.
//!
//! Two failure classes, both fatal to the call that raised them:
//! - `EncodingError` - the input property tree cannot be represented
//! - `FormatError` - an encoded buffer is malformed

use thiserror::Error;

/// Errors raised while encoding a property tree.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A value could not be serialized to the JSON payload.
    #[error("unrepresentable value under key {key:?}: {reason}")]
    Unrepresentable { key: String, reason: String },

    /// The payload outgrew the format's 16-bit offsets.
    #[error("document payload too large for indexing: offset {offset} exceeds 16-bit limit")]
    TooLarge { offset: usize },

    /// More keys than the 16-bit entry count can describe.
    #[error("too many keys to index: {count}")]
    TooManyKeys { count: usize },
}

/// Errors raised while reading an encoded buffer.
///
/// A magic mismatch is not a `FormatError`: such buffers are treated as
/// plain JSON. These errors mean a buffer that claimed to be indexed (or
/// claimed to be JSON) is internally inconsistent.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Buffer too small to hold the fixed header.
    #[error("buffer too small for header: {len} bytes")]
    TruncatedHeader { len: usize },

    /// The declared entry count does not fit in the buffer.
    #[error("index of {count} entries does not fit in {len}-byte buffer")]
    TruncatedIndex { count: usize, len: usize },

    /// An index entry points outside the payload region.
    #[error("index offset {offset} out of bounds (payload is {payload_len} bytes)")]
    OffsetOutOfBounds { offset: usize, payload_len: usize },

    /// A `"key":value` pair at an indexed offset is not shaped like one.
    #[error("malformed key/value pair at payload offset {offset}")]
    MalformedPair { offset: usize },

    /// The payload region is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The payload parsed, but is not a JSON object.
    #[error("document payload is not a JSON object")]
    NotAnObject,
}
