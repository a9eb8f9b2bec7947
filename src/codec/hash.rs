//! Key hashing for the indexed document format.
//!
//! Each index entry stores a 16-bit hash of its key: MurmurHash3 x86-32
//! with seed 0, truncated to the low 16 bits. The truncation means distinct
//! keys can share a hash; readers must confirm the key text at the entry's
//! offset before trusting a match.

use std::io::Cursor;

/// Computes the 16-bit index hash for a document key.
///
/// The hash is computed over the key's UTF-8 bytes and is part of the
/// on-disk format: the same key must produce the same hash on every
/// platform and in every release.
pub fn index_hash(key: &str) -> u16 {
    // Reading from an in-memory cursor cannot fail.
    let hash = murmur3::murmur3_32(&mut Cursor::new(key.as_bytes()), 0).unwrap_or(0);
    (hash & 0xFFFF) as u16
}
