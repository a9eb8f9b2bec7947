//! One committed revision of a document.
//!
//! A node is immutable once committed except for its body slot, which the
//! owning `VersionedDocument` fills on first access. "Not yet loaded" is a
//! distinct state from "loaded and empty".

use super::rev_id::RevId;

/// The body bytes of a revision, loaded lazily from the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodySlot {
    /// The body has not been fetched from the engine yet.
    Unloaded,
    /// The body is cached on the node (possibly zero bytes).
    Loaded(Vec<u8>),
}

/// One revision of a document: identity, parent linkage, tombstone flag,
/// engine-assigned sequence, and a lazily loaded encoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevNode {
    rev_id: RevId,
    parent: Option<RevId>,
    deleted: bool,
    sequence: u64,
    body: BodySlot,
}

impl RevNode {
    /// Creates a node with an unloaded body. `parent` is `None` for a root.
    pub fn new(rev_id: RevId, parent: Option<RevId>, deleted: bool, sequence: u64) -> Self {
        Self {
            rev_id,
            parent,
            deleted,
            sequence,
            body: BodySlot::Unloaded,
        }
    }

    /// Creates a node whose body is already materialized.
    pub fn with_body(
        rev_id: RevId,
        parent: Option<RevId>,
        deleted: bool,
        sequence: u64,
        body: Vec<u8>,
    ) -> Self {
        Self {
            rev_id,
            parent,
            deleted,
            sequence,
            body: BodySlot::Loaded(body),
        }
    }

    #[inline]
    pub fn rev_id(&self) -> &RevId {
        &self.rev_id
    }

    /// The parent revision's ID; `None` marks a tree root.
    #[inline]
    pub fn parent(&self) -> Option<&RevId> {
        self.parent.as_ref()
    }

    /// Whether this revision is a tombstone.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The monotonic per-database sequence assigned by the engine.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn body(&self) -> &BodySlot {
        &self.body
    }

    /// The cached body bytes, or `None` while unloaded.
    #[inline]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            BodySlot::Loaded(bytes) => Some(bytes),
            BodySlot::Unloaded => None,
        }
    }

    #[inline]
    pub fn is_body_loaded(&self) -> bool {
        matches!(self.body, BodySlot::Loaded(_))
    }

    pub(crate) fn set_body(&mut self, bytes: Vec<u8>) {
        self.body = BodySlot::Loaded(bytes);
    }
}
