//! Value types used by the atom store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::atom::{Atom, AtomType, AttentionValue, Handle, TruthValue};

/// Unique identifier for a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(pub Uuid);

impl SpaceId {
    /// Generate a new random space ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SpaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How `remove_atom` treats atoms that are still referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveMode {
    /// Fail with a reference-integrity error if any link points at the atom.
    #[default]
    Strict,
    /// Remove every dependent link first, transitively.
    Recursive,
    /// Strip the atom out of every dependent link, then remove it.
    ///
    /// Dependent links change shape, which breaks their identity; each one
    /// is recorded in the store's audit log.
    Force,
}

/// One link rewritten by a forced removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceRemovalAudit {
    /// The atom that was force-removed.
    pub removed: Handle,
    /// The dependent link whose outgoing set was rewritten.
    pub link: Handle,
    pub old_outgoing: Vec<Handle>,
    pub new_outgoing: Vec<Handle>,
    /// False when the rewritten link now duplicates another link.
    pub still_unique: bool,
    pub timestamp: DateTime<Utc>,
}

/// Everything needed to persist one atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub handle: Handle,
    pub atom: Atom,
    pub tv: TruthValue,
    pub av: AttentionValue,
}

/// Statistics about the store.
#[derive(Debug, Clone, Default)]
pub struct SpaceStats {
    pub total_atoms: usize,
    pub nodes: usize,
    pub links: usize,
    pub atoms_by_type: HashMap<AtomType, usize>,
    pub force_removals: usize,
}
