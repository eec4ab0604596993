//! Atom model: typed nodes and links plus their truth and attention values.
//!
//! Atoms are immutable value objects addressed by [`Handle`]. Links refer to
//! other atoms by handle only, so the graph lives in an arena owned by the
//! [`AtomSpace`](crate::store::AtomSpace) rather than in object references.

mod kind;
pub mod text;
mod types;

pub use kind::AtomType;
pub use text::{parse, parse_many, render};
pub use types::{Atom, AtomExpr, AttentionValue, Handle, TruthValue};
