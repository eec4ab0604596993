//! Pattern matching over an [`AtomSpace`](crate::store::AtomSpace).
//!
//! ```no_run
//! use atomspace_core::{AtomSpace, AtomType, Pattern, PatternMatcher};
//!
//! let space = AtomSpace::new();
//! let dog = space.add_node(AtomType::ConceptNode, "dog", None)?;
//! let mammal = space.add_node(AtomType::ConceptNode, "mammal", None)?;
//! space.add_link(AtomType::InheritanceLink, &[dog, mammal], None)?;
//!
//! let pattern = Pattern::parse(r#"(InheritanceLink $X (ConceptNode "mammal"))"#)?;
//! let bindings = PatternMatcher::new(&space).run(&pattern)?;
//! assert_eq!(bindings[0].get("X"), Some(dog));
//! # Ok::<(), atomspace_core::Error>(())
//! ```

mod binding;
mod compose;
mod matcher;
mod pattern;

pub use binding::Binding;
pub use compose::QueryExpr;
pub use matcher::{Grounding, MatchOptions, MatchReport, PatternMatcher, Query};
pub use pattern::{Constraint, Pattern, Variable};
