//! Revision tree error types.
//!
//! A history walk hitting a pruned ancestor is NOT an error here; that is
//! the `truncated` flag on `RevisionHistory`. These errors are for inputs
//! that name revisions the tree does not hold, or bodies that cannot be
//! used once loaded. Every variant carries the document and revision IDs
//! involved, since these calls happen deep in engine call stacks.

use thiserror::Error;

use crate::codec::FormatError;

/// Errors raised by revision tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The named revision is not present in the document's tree.
    #[error("unknown revision {rev_id} of document {doc_id:?}")]
    UnknownRevision { doc_id: String, rev_id: String },

    /// A revision ID string did not parse as `<generation>-<digest>`.
    #[error("invalid revision id {0:?}")]
    InvalidRevisionId(String),

    /// The engine could not deliver the revision's body bytes.
    #[error("body of revision {rev_id} of document {doc_id:?} unavailable: {reason}")]
    BodyUnavailable {
        doc_id: String,
        rev_id: String,
        reason: String,
    },

    /// The revision's body bytes are not a decodable document.
    #[error("body of revision {rev_id} of document {doc_id:?} is not decodable")]
    InvalidBody {
        doc_id: String,
        rev_id: String,
        #[source]
        source: FormatError,
    },
}
