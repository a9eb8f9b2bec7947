//! stratodb - storage core of an embedded, multi-version document database
//!
//! Three subsystems cover how a document's bytes get to and from disk:
//! - `codec` - binary document encoding with a hash-indexed header
//! - `revtree` - revision history assembly and conflict ordering
//! - `blob` - streaming, content-addressed attachment storage
//!
//! The transactional engine that supplies snapshots, commits, and
//! durability sits below this crate and is consumed through the
//! `revtree::RevisionStore` seam.

pub mod blob;
pub mod codec;
pub mod revtree;
