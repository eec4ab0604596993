//! # atomspace-core
//!
//! A hypergraph knowledge store with a backtracking pattern matcher and an
//! economic attention-allocation subsystem.
//!
//! ## Core Components
//!
//! - **Atom**: typed nodes and links, truth values, attention values and the
//!   parenthesized text form
//! - **Store**: the [`AtomSpace`], which interns atoms and keeps type, name
//!   and incoming-set indices consistent
//! - **Query**: patterns with variables, answered by the [`PatternMatcher`]
//! - **Attention**: the STI/LTI fund economy, attentional focus, diffusion,
//!   rent and forgetting
//! - **Storage**: the [`StorageGateway`] contract with memory and SQLite
//!   backends
//!
//! ## Example
//!
//! ```rust
//! use atomspace_core::{AtomSpace, AtomType, Pattern};
//!
//! let space = AtomSpace::new();
//! let dog = space.add_node(AtomType::ConceptNode, "dog", None)?;
//! let mammal = space.add_node(AtomType::ConceptNode, "mammal", None)?;
//! space.add_link(AtomType::InheritanceLink, &[dog, mammal], None)?;
//!
//! let pattern = Pattern::parse(r#"(InheritanceLink $X (ConceptNode "mammal"))"#)?;
//! let bindings = space.match_pattern(&pattern, &[], None)?;
//! assert_eq!(bindings[0].get("X"), Some(dog));
//!
//! space.stimulate(dog, 50)?;
//! assert!(space.attention().in_focus(dog)?);
//! # Ok::<(), atomspace_core::Error>(())
//! ```

pub mod atom;
pub mod attention;
pub mod error;
pub mod query;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use atom::{Atom, AtomExpr, AtomType, AttentionValue, Handle, TruthValue};
#[cfg(feature = "tokio-runtime")]
pub use attention::MaintenanceHandle;
pub use attention::{
    AttentionBank, AttentionConfig, BankSummary, DiffusionReport, ForgetReport, ForgettingAgent,
    Goal, GoalRegistry, ImportanceDiffusion, MaintenanceScheduler, RentCollector, RentReport,
    TickReport,
};
pub use error::{Error, ErrorKind, Result};
pub use query::{
    Binding, Constraint, Grounding, MatchOptions, MatchReport, Pattern, PatternMatcher, Query,
    QueryExpr, Variable,
};
pub use storage::{MemoryBackend, PersistedAtom, SqliteBackend, StorageGateway};
pub use store::{AtomRecord, AtomSpace, ForceRemovalAudit, RemoveMode, SpaceId, SpaceStats};
