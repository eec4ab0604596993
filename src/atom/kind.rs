//! Atom types and the type hierarchy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Custom type names must read like the built-in ones.
static CUSTOM_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z0-9]*(Node|Link)$").expect("Invalid regex")
});

/// Type of an atom.
///
/// The built-in variants cover the vocabulary the reasoning and language
/// layers use; anything else goes through [`AtomType::Custom`], whose name
/// suffix (`...Node` / `...Link`) decides which side of the hierarchy it
/// lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomType {
    /// Abstract root of the hierarchy.
    Atom,
    /// Abstract parent of every node type.
    Node,
    /// Abstract parent of every link type.
    Link,

    ConceptNode,
    PredicateNode,
    SchemaNode,
    NumberNode,
    WordNode,
    AnchorNode,

    ListLink,
    InheritanceLink,
    SimilarityLink,
    MemberLink,
    SubsetLink,
    EvaluationLink,
    ImplicationLink,
    ExecutionLink,
    ContextLink,
    AndLink,
    OrLink,
    NotLink,

    /// Open-ended type, e.g. `"GroundedSchemaNode"`.
    Custom(String),
}

const BUILTIN: &[AtomType] = &[
    AtomType::Atom,
    AtomType::Node,
    AtomType::Link,
    AtomType::ConceptNode,
    AtomType::PredicateNode,
    AtomType::SchemaNode,
    AtomType::NumberNode,
    AtomType::WordNode,
    AtomType::AnchorNode,
    AtomType::ListLink,
    AtomType::InheritanceLink,
    AtomType::SimilarityLink,
    AtomType::MemberLink,
    AtomType::SubsetLink,
    AtomType::EvaluationLink,
    AtomType::ImplicationLink,
    AtomType::ExecutionLink,
    AtomType::ContextLink,
    AtomType::AndLink,
    AtomType::OrLink,
    AtomType::NotLink,
];

impl AtomType {
    /// Canonical type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Atom => "Atom",
            Self::Node => "Node",
            Self::Link => "Link",
            Self::ConceptNode => "ConceptNode",
            Self::PredicateNode => "PredicateNode",
            Self::SchemaNode => "SchemaNode",
            Self::NumberNode => "NumberNode",
            Self::WordNode => "WordNode",
            Self::AnchorNode => "AnchorNode",
            Self::ListLink => "ListLink",
            Self::InheritanceLink => "InheritanceLink",
            Self::SimilarityLink => "SimilarityLink",
            Self::MemberLink => "MemberLink",
            Self::SubsetLink => "SubsetLink",
            Self::EvaluationLink => "EvaluationLink",
            Self::ImplicationLink => "ImplicationLink",
            Self::ExecutionLink => "ExecutionLink",
            Self::ContextLink => "ContextLink",
            Self::AndLink => "AndLink",
            Self::OrLink => "OrLink",
            Self::NotLink => "NotLink",
            Self::Custom(name) => name,
        }
    }

    /// Resolve a type by name, falling back to a validated custom type.
    pub fn from_name(name: &str) -> Result<Self> {
        if let Some(t) = BUILTIN.iter().find(|t| t.name() == name) {
            return Ok(t.clone());
        }
        if CUSTOM_TYPE_RE.is_match(name) {
            Ok(Self::Custom(name.to_string()))
        } else {
            Err(Error::validation(format!("Unknown atom type '{}'", name)))
        }
    }

    /// Normalize a custom type: names of built-in types resolve to the
    /// built-in variant and other names must pass the custom-type check.
    pub fn canonical(self) -> Result<Self> {
        match self {
            Self::Custom(name) => Self::from_name(&name),
            builtin => Ok(builtin),
        }
    }

    /// Direct supertype, `None` for the root.
    pub fn parent(&self) -> Option<AtomType> {
        match self {
            Self::Atom => None,
            Self::Node | Self::Link => Some(Self::Atom),
            Self::ConceptNode
            | Self::PredicateNode
            | Self::SchemaNode
            | Self::NumberNode
            | Self::WordNode
            | Self::AnchorNode => Some(Self::Node),
            Self::Custom(name) if name.ends_with("Node") => Some(Self::Node),
            _ => Some(Self::Link),
        }
    }

    /// True if `self` equals `ancestor` or inherits from it.
    pub fn is_a(&self, ancestor: &AtomType) -> bool {
        let mut current = Some(self.clone());
        while let Some(t) = current {
            if &t == ancestor {
                return true;
            }
            current = t.parent();
        }
        false
    }

    /// Whether atoms of this type are nodes.
    pub fn is_node(&self) -> bool {
        self.is_a(&Self::Node)
    }

    /// Whether atoms of this type are links.
    pub fn is_link(&self) -> bool {
        self.is_a(&Self::Link)
    }

    /// Abstract types exist only for hierarchy queries.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Atom | Self::Node | Self::Link)
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AtomType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}
