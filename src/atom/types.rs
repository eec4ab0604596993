//! Core value types: handles, atoms, truth and attention values.

use serde::{Deserialize, Serialize};

use super::kind::AtomType;
use crate::error::{Error, Result};

/// Opaque identifier of one atom within a store.
///
/// Handles are issued from a monotonically increasing counter and are never
/// reused within a session, even after the atom is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Probabilistic belief attached to an atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// Strength in [0, 1].
    pub strength: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl TruthValue {
    pub const DEFAULT_STRENGTH: f64 = 0.5;
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;

    /// Create a truth value, rejecting anything outside [0, 1].
    pub fn new(strength: f64, confidence: f64) -> Result<Self> {
        for (label, v) in [("strength", strength), ("confidence", confidence)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(Error::validation(format!(
                    "Truth value {} {} outside [0, 1]",
                    label, v
                )));
            }
        }
        Ok(Self {
            strength,
            confidence,
        })
    }

    /// Merge evidence from an independent source.
    ///
    /// Strength is the confidence-weighted mean of both strengths; confidence
    /// combines as `c1 + c2 - c1*c2`. Both are clamped to [0, 1].
    pub fn merge(&self, other: &TruthValue) -> TruthValue {
        let weight = self.confidence + other.confidence;
        let strength = if weight > 0.0 {
            (self.strength * self.confidence + other.strength * other.confidence) / weight
        } else {
            (self.strength + other.strength) / 2.0
        };
        let confidence =
            self.confidence + other.confidence - self.confidence * other.confidence;
        TruthValue {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self {
            strength: Self::DEFAULT_STRENGTH,
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }
}

/// Processing priority of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionValue {
    /// Short-term importance. Negative means the atom owes rent.
    pub sti: i32,
    /// Long-term importance.
    pub lti: i32,
    /// Very-long-term flag: never forgotten.
    pub vlti: bool,
}

impl AttentionValue {
    pub fn new(sti: i32, lti: i32, vlti: bool) -> Self {
        Self { sti, lti, vlti }
    }
}

/// A stored atom: a named node or a link over other atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Atom {
    Node { atom_type: AtomType, name: String },
    Link { atom_type: AtomType, outgoing: Vec<Handle> },
}

impl Atom {
    pub fn atom_type(&self) -> &AtomType {
        match self {
            Self::Node { atom_type, .. } | Self::Link { atom_type, .. } => atom_type,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Node { name, .. } => Some(name),
            Self::Link { .. } => None,
        }
    }

    /// Outgoing set; empty for nodes.
    pub fn outgoing(&self) -> &[Handle] {
        match self {
            Self::Node { .. } => &[],
            Self::Link { outgoing, .. } => outgoing,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. })
    }
}

/// Detached, handle-free tree form of an atom.
///
/// This is what the textual format reads and writes. Only the root carries a
/// truth value; nested atoms are references by structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomExpr {
    Node {
        atom_type: AtomType,
        name: String,
        tv: Option<TruthValue>,
    },
    Link {
        atom_type: AtomType,
        outgoing: Vec<AtomExpr>,
        tv: Option<TruthValue>,
    },
}

impl AtomExpr {
    /// Node expression without a truth value.
    pub fn node(atom_type: AtomType, name: impl Into<String>) -> Self {
        Self::Node {
            atom_type,
            name: name.into(),
            tv: None,
        }
    }

    /// Link expression without a truth value.
    pub fn link(atom_type: AtomType, outgoing: Vec<AtomExpr>) -> Self {
        Self::Link {
            atom_type,
            outgoing,
            tv: None,
        }
    }

    /// Attach a truth value to the root.
    pub fn with_tv(mut self, value: TruthValue) -> Self {
        match &mut self {
            Self::Node { tv, .. } | Self::Link { tv, .. } => *tv = Some(value),
        }
        self
    }

    /// Drop the root truth value.
    pub fn without_tv(mut self) -> Self {
        match &mut self {
            Self::Node { tv, .. } | Self::Link { tv, .. } => *tv = None,
        }
        self
    }

    pub fn atom_type(&self) -> &AtomType {
        match self {
            Self::Node { atom_type, .. } | Self::Link { atom_type, .. } => atom_type,
        }
    }

    pub fn tv(&self) -> Option<TruthValue> {
        match self {
            Self::Node { tv, .. } | Self::Link { tv, .. } => *tv,
        }
    }
}
