//! Authoritative atom registry with type, name and incoming-set indices.
//!
//! ## Example
//!
//! ```rust
//! use atomspace_core::{AtomSpace, AtomType, RemoveMode};
//!
//! let space = AtomSpace::new();
//! let dog = space.add_node(AtomType::ConceptNode, "dog", None)?;
//! let mammal = space.add_node(AtomType::ConceptNode, "mammal", None)?;
//! let link = space.add_link(AtomType::InheritanceLink, &[dog, mammal], None)?;
//!
//! assert_eq!(space.get_incoming(mammal)?, vec![link]);
//! assert!(space.remove_atom(mammal, RemoveMode::Strict).is_err());
//! # Ok::<(), atomspace_core::Error>(())
//! ```

mod index;
#[cfg(test)]
mod proptest;
mod space;
mod types;

pub(crate) use space::AtomTable;
pub use space::AtomSpace;
pub use types::{AtomRecord, ForceRemovalAudit, RemoveMode, SpaceId, SpaceStats};
