//! Binary document codec
//!
//! Encodes document property trees into a compact binary form with a
//! hash-indexed header, so a single key can be looked up without parsing
//! the whole payload.
//!
//! This module provides:
//! - `encode` - property map → indexed binary buffer
//! - `IndexedDocument` - read view over an encoded buffer with key lookup,
//!   optional overlay values, and an optional per-instance value cache
//! - `classify` / `strip_index` - buffer classification and index removal
//! - `index_hash` - the 16-bit key hash used by the index

mod document;
mod encoder;
mod errors;
mod hash;

pub use document::{classify, is_valid_indexed, strip_index, BufferKind, IndexedDocument};
pub use encoder::{encode, ENTRY_SIZE, HEADER_SIZE, MAGIC};
pub use errors::{EncodingError, FormatError};
pub use hash::index_hash;
