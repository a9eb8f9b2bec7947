//! Revision tree assembly
//!
//! Translates the storage engine's versioned-document structure into
//! application-visible revision histories and conflict sets.
//!
//! This module provides:
//! - `RevId` - generation + digest revision identifier with the
//!   deterministic conflict-priority ordering
//! - `RevNode` - one committed revision with parent linkage and a lazily
//!   loaded body
//! - `VersionedDocument` - arena of all revisions of one document;
//!   enumerates ordered leaves and walks ancestor histories
//! - `RevisionStore` - the seam to the engine's on-demand body retrieval

mod document;
mod errors;
mod node;
mod rev_id;

pub use document::{RevisionHistory, RevisionStore, VersionedDocument};
pub use errors::TreeError;
pub use node::{BodySlot, RevNode};
pub use rev_id::RevId;
