//! Content-addressed attachment storage
//!
//! Attachments are stored under the SHA-1 digest of their plaintext, so
//! identical content never occupies two slots. Writes stream through a
//! `BlobWriter` session that hashes while it writes and can decompress or
//! delta-decode the incoming bytes on the fly; the digests always describe
//! the final plaintext regardless of how it arrived.
//!
//! This module provides:
//! - `BlobKey` / `Md5Digest` - content digests and their display forms
//! - `BlobStore` - filesystem store keyed by `BlobKey`
//! - `BlobWriter` - streaming write session (open → finished → installed)
//! - `DeltaDecoder` - incremental copy/insert delta decoding

mod delta;
mod errors;
mod key;
mod store;
mod writer;

pub use delta::DeltaDecoder;
pub use errors::{BlobError, BlobResult};
pub use key::{BlobKey, Md5Digest, BLOB_KEY_LEN, MD5_DIGEST_LEN};
pub use store::BlobStore;
pub use writer::BlobWriter;
