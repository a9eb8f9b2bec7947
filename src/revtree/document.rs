//! The versioned-document arena.
//!
//! All revisions of one document, keyed by revision ID with parent links as
//! ID references. A document normally forms a single rooted tree; explicit
//! conflicts add further roots or branches. Leaves are the revisions never
//! named as anyone's parent. The engine may prune old ancestors, in which
//! case the oldest reachable node acts as a root for traversal.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::codec::IndexedDocument;

use super::errors::TreeError;
use super::node::{BodySlot, RevNode};
use super::rev_id::RevId;

/// The engine boundary for on-demand body retrieval.
///
/// Implementations return the raw encoded body bytes committed for one
/// revision. Called at most once per node per in-memory document instance;
/// the bytes are cached on the node afterwards.
pub trait RevisionStore {
    fn load_body(&self, doc_id: &str, rev_id: &RevId) -> Result<Vec<u8>, TreeError>;
}

/// A revision plus its ancestors, newest first.
///
/// `truncated` is set when the walk hit a pruned parent before reaching a
/// root or the stop set. That is expected engine behavior, not an error;
/// consumers treat the list as a valid partial history.
#[derive(Debug)]
pub struct RevisionHistory<'a> {
    pub revisions: Vec<&'a RevNode>,
    pub truncated: bool,
}

/// The set of all revisions of one document.
#[derive(Clone, Debug, Default)]
pub struct VersionedDocument {
    doc_id: String,
    nodes: HashMap<RevId, RevNode>,
}

impl VersionedDocument {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            nodes: HashMap::new(),
        }
    }

    #[inline]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a committed revision. Returns false (and keeps the existing
    /// node) if the revision is already present.
    pub fn insert(&mut self, node: RevNode) -> bool {
        if self.nodes.contains_key(node.rev_id()) {
            return false;
        }
        self.nodes.insert(node.rev_id().clone(), node);
        true
    }

    pub fn get(&self, rev_id: &RevId) -> Option<&RevNode> {
        self.nodes.get(rev_id)
    }

    /// True if no node names this revision as its parent.
    pub fn is_leaf(&self, rev_id: &RevId) -> bool {
        self.nodes.contains_key(rev_id)
            && !self.nodes.values().any(|n| n.parent() == Some(rev_id))
    }

    /// All leaf nodes, in no particular order.
    pub fn leaves(&self) -> Vec<&RevNode> {
        let parents: HashSet<&RevId> = self.nodes.values().filter_map(|n| n.parent()).collect();
        self.nodes
            .values()
            .filter(|n| !parents.contains(n.rev_id()))
            .collect()
    }

    /// Number of leaf revisions (one plus the number of open conflicts).
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// IDs of all current (leaf) revisions in descending priority order.
    ///
    /// Non-deleted leaves sort before deleted ones; within each class the
    /// revision-ID ordering applies. The order depends only on the leaf set
    /// itself, never on insertion order. With `include_deleted = false`,
    /// tombstone leaves are dropped from the list (a document whose leaves
    /// are all tombstones then yields an empty list, but the tombstones
    /// still resolve through `winning_revision`).
    pub fn current_revision_ids(&self, include_deleted: bool) -> Vec<RevId> {
        let mut leaves = self.leaves();
        leaves.sort_by(|a, b| {
            a.is_deleted()
                .cmp(&b.is_deleted())
                .then_with(|| b.rev_id().cmp(a.rev_id()))
        });
        leaves
            .into_iter()
            .filter(|n| include_deleted || !n.is_deleted())
            .map(|n| n.rev_id().clone())
            .collect()
    }

    /// The revision any consumer must report as the document's current
    /// state: the first current revision, tombstone or not.
    pub fn winning_revision(&self) -> Option<RevId> {
        self.current_revision_ids(true).into_iter().next()
    }

    /// True if the document's winning revision is a tombstone.
    pub fn is_deleted(&self) -> bool {
        match self.winning_revision() {
            Some(rev_id) => self
                .get(&rev_id)
                .map(RevNode::is_deleted)
                .unwrap_or(false),
            None => false,
        }
    }

    /// True if the document has a live (non-deleted) current revision.
    pub fn exists(&self) -> bool {
        !self.is_empty() && !self.is_deleted()
    }

    /// Walks parent pointers from `rev_id`, newest first.
    ///
    /// Emission stops after any node whose ID is in `stop_at`, or at a
    /// root. Hitting a pruned parent first sets `truncated` instead of
    /// failing. Errors only if `rev_id` itself is unknown.
    pub fn history_of(
        &self,
        rev_id: &RevId,
        stop_at: &HashSet<RevId>,
    ) -> Result<RevisionHistory<'_>, TreeError> {
        let mut node = self
            .nodes
            .get(rev_id)
            .ok_or_else(|| TreeError::UnknownRevision {
                doc_id: self.doc_id.clone(),
                rev_id: rev_id.to_string(),
            })?;

        let mut revisions = Vec::new();
        loop {
            revisions.push(node);
            if stop_at.contains(node.rev_id()) {
                return Ok(RevisionHistory {
                    revisions,
                    truncated: false,
                });
            }
            match node.parent() {
                None => {
                    return Ok(RevisionHistory {
                        revisions,
                        truncated: false,
                    })
                }
                Some(parent_id) => match self.nodes.get(parent_id) {
                    Some(parent) => node = parent,
                    None => {
                        warn!(
                            doc_id = %self.doc_id,
                            rev_id = %node.rev_id(),
                            missing_parent = %parent_id,
                            "revision history truncated at pruned ancestor"
                        );
                        return Ok(RevisionHistory {
                            revisions,
                            truncated: true,
                        });
                    }
                },
            }
        }
    }

    /// The revision's encoded body, loading it through `store` on first
    /// access and caching it on the node afterwards.
    ///
    /// Mutates cached state; sharing one instance across threads requires
    /// external synchronization.
    pub fn load_body(
        &mut self,
        rev_id: &RevId,
        store: &dyn RevisionStore,
    ) -> Result<&[u8], TreeError> {
        let node = self
            .nodes
            .get_mut(rev_id)
            .ok_or_else(|| TreeError::UnknownRevision {
                doc_id: self.doc_id.clone(),
                rev_id: rev_id.to_string(),
            })?;
        if !node.is_body_loaded() {
            let bytes = store.load_body(&self.doc_id, rev_id)?;
            node.set_body(bytes);
        }
        match node.body() {
            BodySlot::Loaded(bytes) => Ok(bytes),
            BodySlot::Unloaded => Err(TreeError::BodyUnavailable {
                doc_id: self.doc_id.clone(),
                rev_id: rev_id.to_string(),
                reason: "body did not materialize".to_string(),
            }),
        }
    }

    /// A property view over the revision's body, loading it if needed.
    ///
    /// The view decodes individual keys on demand rather than parsing the
    /// whole payload up front.
    pub fn properties(
        &mut self,
        rev_id: &RevId,
        store: &dyn RevisionStore,
        cache_values: bool,
    ) -> Result<IndexedDocument, TreeError> {
        let bytes = self.load_body(rev_id, store)?.to_vec();
        IndexedDocument::new(bytes, None, cache_values).map_err(|source| TreeError::InvalidBody {
            doc_id: self.doc_id.clone(),
            rev_id: rev_id.to_string(),
            source,
        })
    }
}
