//! Revision Tree Invariant Tests
//!
//! Tests for the revision assembly contracts:
//! - Ordering determinism: current revisions are a pure function of the
//!   leaf set, never of insertion order
//! - Winning-revision stability across conflicting branches
//! - History termination at roots, stop sets, and pruned ancestors
//! - Lazy body materialization through the engine seam

use std::cell::RefCell;
use std::collections::HashSet;

use serde_json::json;
use stratodb::codec::encode;
use stratodb::revtree::{RevId, RevNode, RevisionStore, TreeError, VersionedDocument};

// =============================================================================
// Test Utilities
// =============================================================================

fn rev(s: &str) -> RevId {
    s.parse().unwrap()
}

fn node(rev_id: &str, parent: Option<&str>, deleted: bool, seq: u64) -> RevNode {
    RevNode::new(rev(rev_id), parent.map(rev), deleted, seq)
}

fn stops(ids: &[&str]) -> HashSet<RevId> {
    ids.iter().map(|s| rev(s)).collect()
}

/// Engine stand-in that counts how often each body is requested.
struct CountingStore {
    body: Vec<u8>,
    loads: RefCell<u32>,
}

impl CountingStore {
    fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            loads: RefCell::new(0),
        }
    }
}

impl RevisionStore for CountingStore {
    fn load_body(&self, _doc_id: &str, _rev_id: &RevId) -> Result<Vec<u8>, TreeError> {
        *self.loads.borrow_mut() += 1;
        Ok(self.body.clone())
    }
}

// =============================================================================
// Ordering Determinism
// =============================================================================

/// The current-revision list is identical for every insertion order.
#[test]
fn test_current_revisions_independent_of_insertion_order() {
    let specs: [(&str, Option<&str>, bool); 5] = [
        ("1-aaa", None, false),
        ("2-bbb", Some("1-aaa"), false),
        ("2-ddd", Some("1-aaa"), false),
        ("3-ccc", Some("2-bbb"), false),
        ("2-abc", Some("1-aaa"), false),
    ];

    // A handful of distinct permutations, including reverse.
    let orders: [[usize; 5]; 4] = [
        [0, 1, 2, 3, 4],
        [4, 3, 2, 1, 0],
        [2, 0, 4, 1, 3],
        [3, 4, 0, 2, 1],
    ];

    let mut results = Vec::new();
    for order in orders {
        let mut doc = VersionedDocument::new("doc");
        for &i in &order {
            let (id, parent, deleted) = specs[i];
            doc.insert(node(id, parent, deleted, i as u64 + 1));
        }
        results.push(doc.current_revision_ids(true));
    }

    // 3-ccc outranks every generation 2; digests break the 2-way tie.
    let expected = vec![rev("3-ccc"), rev("2-ddd"), rev("2-abc")];
    for result in &results {
        assert_eq!(result, &expected);
    }
}

/// Generations compare numerically, not lexicographically.
#[test]
fn test_generation_ten_beats_generation_nine() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("9-zzz", None, false, 1));
    doc.insert(node("10-aaa", None, false, 2));

    assert_eq!(doc.winning_revision(), Some(rev("10-aaa")));
}

// =============================================================================
// Conflicts, Tombstones, and the Winning Revision
// =============================================================================

/// The worked conflict scenario: a deleted branch tip loses to the live
/// branch, but still resolves when deleted revisions are included.
#[test]
fn test_deleted_branch_ordering_pinned() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));
    doc.insert(node("2-bbb", Some("1-aaa"), false, 2));
    doc.insert(node("3-ccc", Some("2-bbb"), true, 3));
    doc.insert(node("2-ddd", Some("1-aaa"), false, 4));

    assert_eq!(doc.current_revision_ids(false), vec![rev("2-ddd")]);
    // Deleted leaves sort after live ones regardless of generation.
    assert_eq!(
        doc.current_revision_ids(true),
        vec![rev("2-ddd"), rev("3-ccc")]
    );
    assert_eq!(doc.winning_revision(), Some(rev("2-ddd")));
    assert!(doc.exists());
    assert!(!doc.is_deleted());
}

/// A document whose every leaf is a tombstone is deleted, but the
/// tombstone itself still resolves as the winner.
#[test]
fn test_all_deleted_document_resolves_tombstone() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));
    doc.insert(node("2-bbb", Some("1-aaa"), true, 2));
    doc.insert(node("2-ccc", Some("1-aaa"), true, 3));

    assert!(doc.current_revision_ids(false).is_empty());
    assert_eq!(
        doc.current_revision_ids(true),
        vec![rev("2-ccc"), rev("2-bbb")]
    );
    assert_eq!(doc.winning_revision(), Some(rev("2-ccc")));
    assert!(doc.is_deleted());
    assert!(!doc.exists());
}

// =============================================================================
// History Termination
// =============================================================================

/// A reachable stop ancestor is always the last element, never passed.
#[test]
fn test_history_stops_at_ancestor_inclusive() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));
    doc.insert(node("2-bbb", Some("1-aaa"), false, 2));
    doc.insert(node("3-ccc", Some("2-bbb"), false, 3));
    doc.insert(node("4-ddd", Some("3-ccc"), false, 4));

    let history = doc.history_of(&rev("4-ddd"), &stops(&["2-bbb"])).unwrap();
    let ids: Vec<String> = history
        .revisions
        .iter()
        .map(|n| n.rev_id().to_string())
        .collect();
    assert_eq!(ids, vec!["4-ddd", "3-ccc", "2-bbb"]);
    assert!(!history.truncated);
}

/// Without a stop set, the walk runs to the root.
#[test]
fn test_history_runs_to_root() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));
    doc.insert(node("2-bbb", Some("1-aaa"), false, 2));

    let history = doc.history_of(&rev("2-bbb"), &HashSet::new()).unwrap();
    let ids: Vec<String> = history
        .revisions
        .iter()
        .map(|n| n.rev_id().to_string())
        .collect();
    assert_eq!(ids, vec!["2-bbb", "1-aaa"]);
    assert!(!history.truncated);
}

/// A start node inside the stop set emits exactly itself.
#[test]
fn test_history_start_in_stop_set() {
    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));
    doc.insert(node("2-bbb", Some("1-aaa"), false, 2));

    let history = doc.history_of(&rev("2-bbb"), &stops(&["2-bbb"])).unwrap();
    assert_eq!(history.revisions.len(), 1);
    assert_eq!(history.revisions[0].rev_id(), &rev("2-bbb"));
}

/// A pruned ancestor yields a valid partial history, flagged but not failed.
#[test]
fn test_pruned_ancestor_is_partial_success() {
    let mut doc = VersionedDocument::new("doc");
    // The engine retained only generations 5 and 6.
    doc.insert(node("5-eee", Some("4-ddd"), false, 8));
    doc.insert(node("6-fff", Some("5-eee"), false, 9));

    let history = doc
        .history_of(&rev("6-fff"), &stops(&["1-aaa"]))
        .unwrap();
    assert!(history.truncated, "pruned parent must set the flag");
    let ids: Vec<String> = history
        .revisions
        .iter()
        .map(|n| n.rev_id().to_string())
        .collect();
    assert_eq!(ids, vec!["6-fff", "5-eee"]);
}

// =============================================================================
// Lazy Body Materialization
// =============================================================================

/// The engine is asked for a body exactly once per node instance.
#[test]
fn test_body_loaded_once_then_cached() {
    let body = encode(json!({"title": "cached"}).as_object().unwrap()).unwrap();
    let store = CountingStore::new(body.clone());

    let mut doc = VersionedDocument::new("doc");
    doc.insert(node("1-aaa", None, false, 1));

    assert_eq!(doc.load_body(&rev("1-aaa"), &store).unwrap(), &body[..]);
    assert_eq!(doc.load_body(&rev("1-aaa"), &store).unwrap(), &body[..]);
    let view = doc.properties(&rev("1-aaa"), &store, false).unwrap();
    assert_eq!(view.get("title").unwrap(), Some(json!("cached")));

    assert_eq!(*store.loads.borrow(), 1, "body must be fetched once");
}

/// A node committed with its body never consults the engine.
#[test]
fn test_preloaded_body_skips_engine() {
    struct PanicStore;
    impl RevisionStore for PanicStore {
        fn load_body(&self, _doc_id: &str, _rev_id: &RevId) -> Result<Vec<u8>, TreeError> {
            panic!("preloaded body must not hit the engine");
        }
    }

    let body = br#"{"inline": true}"#.to_vec();
    let mut doc = VersionedDocument::new("doc");
    doc.insert(RevNode::with_body(rev("1-aaa"), None, false, 1, body.clone()));

    assert_eq!(doc.load_body(&rev("1-aaa"), &PanicStore).unwrap(), &body[..]);
}

/// Failures carry the document and revision identifiers.
#[test]
fn test_errors_name_the_revision() {
    let mut doc = VersionedDocument::new("orders/1142");
    let err = doc
        .load_body(&rev("7-nope"), &CountingStore::new(Vec::new()))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("orders/1142"), "{message}");
    assert!(message.contains("7-nope"), "{message}");
}
