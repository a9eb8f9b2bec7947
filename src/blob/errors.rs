//! Blob store error types.
//!
//! No variant triggers an internal retry; transient-vs-permanent policy
//! belongs to the caller. Variants carry the blob key or file path involved
//! so failures surfacing from deep call stacks stay attributable.

use std::io;

use thiserror::Error;

use super::key::BlobKey;

/// Result type for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors raised by the blob store and its write sessions.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No blob stored under this key.
    #[error("blob not found: {0}")]
    NotFound(BlobKey),

    /// A delta transform named a base blob the store does not hold.
    #[error("delta base blob not found: {0}")]
    UnknownBaseBlob(BlobKey),

    /// A digest string or key byte length did not parse.
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// The input transform detected malformed data. The session stays
    /// inspectable so the caller can cancel.
    #[error("blob transform failed ({path}): {reason}")]
    Transform { path: String, reason: String },

    /// An underlying read/write/rename failed. For `append` failures the
    /// session stays open and the caller may retry.
    #[error("blob I/O failure ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A session method was called in the wrong state.
    #[error("invalid blob session state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}
