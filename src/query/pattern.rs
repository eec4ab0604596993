//! Query patterns and constraints.
//!
//! Patterns share the atom text grammar, with `$Name` for variables and
//! `#N` for a literal handle:
//!
//! ```text
//! (InheritanceLink $X (ConceptNode "mammal"))
//! (EvaluationLink (PredicateNode "likes") (ListLink $A #12))
//! ```

use serde::{Deserialize, Serialize};

use crate::atom::text::{read_all, SExpr};
use crate::atom::{AtomType, Handle};
use crate::error::{Error, Result};

/// A variable name, stored without the leading `$`.
pub type Variable = String;

/// Atom template with variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// Binds to any atom (subject to constraints).
    Variable { name: Variable },
    /// Matches exactly this atom.
    Handle { handle: Handle },
    /// Matches the node with this type (or subtype) and name.
    Node { atom_type: AtomType, name: String },
    /// Matches links of this type (or subtype) whose outgoing slots match.
    Link {
        atom_type: AtomType,
        outgoing: Vec<Pattern>,
    },
}

impl Pattern {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    pub fn handle(handle: Handle) -> Self {
        Self::Handle { handle }
    }

    pub fn node(atom_type: AtomType, name: impl Into<String>) -> Self {
        Self::Node {
            atom_type,
            name: name.into(),
        }
    }

    pub fn link(atom_type: AtomType, outgoing: Vec<Pattern>) -> Self {
        Self::Link {
            atom_type,
            outgoing,
        }
    }

    /// Variables in order of first occurrence.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(p) = stack.pop() {
            match p {
                Self::Variable { name } => {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
                Self::Link { outgoing, .. } => stack.extend(outgoing.iter().rev()),
                Self::Handle { .. } | Self::Node { .. } => {}
            }
        }
        out
    }

    /// True if the pattern contains no variables.
    pub fn is_ground(&self) -> bool {
        self.variables().is_empty()
    }

    /// Check structural well-formedness.
    pub fn validate(&self) -> Result<()> {
        let mut stack = vec![self];
        while let Some(p) = stack.pop() {
            match p {
                Self::Variable { name } if name.is_empty() => {
                    return Err(Error::malformed_pattern("Empty variable name", 0));
                }
                Self::Node { atom_type, .. } if !atom_type.is_node() => {
                    return Err(Error::malformed_pattern(
                        format!("{} cannot name a node", atom_type),
                        0,
                    ));
                }
                Self::Link {
                    atom_type,
                    outgoing,
                } => {
                    if !atom_type.is_link() {
                        return Err(Error::malformed_pattern(
                            format!("{} cannot head a link pattern", atom_type),
                            0,
                        ));
                    }
                    stack.extend(outgoing.iter());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Parse a pattern from text.
    pub fn parse(input: &str) -> Result<Self> {
        let exprs =
            read_all(input).map_err(|e| Error::malformed_pattern(e.message, e.offset))?;
        match exprs.as_slice() {
            [one] => sexpr_to_pattern(one),
            [] => Err(Error::malformed_pattern("Empty pattern", 0)),
            [_, second, ..] => Err(Error::malformed_pattern(
                "Trailing input after pattern",
                second.offset(),
            )),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Variable { name } => write!(f, "${}", name),
            Self::Handle { handle } => write!(f, "{}", handle),
            Self::Node { atom_type, name } => {
                write!(f, "({} {})", atom_type, crate::atom::text::quote(name))
            }
            Self::Link {
                atom_type,
                outgoing,
            } => {
                write!(f, "({}", atom_type)?;
                for child in outgoing {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn sexpr_to_pattern(expr: &SExpr) -> Result<Pattern> {
    match expr {
        SExpr::Symbol(sym, offset) => {
            if let Some(name) = sym.strip_prefix('$') {
                if name.is_empty() {
                    return Err(Error::malformed_pattern("Empty variable name", *offset));
                }
                Ok(Pattern::var(name))
            } else if let Some(raw) = sym.strip_prefix('#') {
                raw.parse::<u64>()
                    .map(|v| Pattern::handle(Handle::new(v)))
                    .map_err(|_| {
                        Error::malformed_pattern(format!("Invalid handle '{}'", sym), *offset)
                    })
            } else {
                Err(Error::malformed_pattern(
                    format!("Unexpected symbol '{}'", sym),
                    *offset,
                ))
            }
        }
        SExpr::Str(_, offset) => Err(Error::malformed_pattern(
            "Bare string outside a node",
            *offset,
        )),
        SExpr::List(items, offset) => {
            let atom_type = match items.first() {
                Some(SExpr::Symbol(name, o)) => AtomType::from_name(name)
                    .map_err(|e| Error::malformed_pattern(e.to_string(), *o))?,
                _ => return Err(Error::malformed_pattern("Expected atom type", *offset)),
            };
            if atom_type.is_node() {
                match &items[1..] {
                    [SExpr::Str(name, _)] => Ok(Pattern::node(atom_type, name.clone())),
                    [SExpr::Symbol(sym, o)] if sym.starts_with('$') => {
                        Err(Error::malformed_pattern(
                            "Node names cannot be variables; use a type constraint",
                            *o,
                        ))
                    }
                    _ => Err(Error::malformed_pattern(
                        format!("{} expects exactly one quoted name", atom_type),
                        *offset,
                    )),
                }
            } else {
                let outgoing = items[1..]
                    .iter()
                    .map(sexpr_to_pattern)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Pattern::link(atom_type, outgoing))
            }
        }
    }
}

/// Extra restrictions on variable bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// The variable must bind to an atom of this type (or a subtype).
    Type {
        variable: Variable,
        atom_type: AtomType,
        include_subtypes: bool,
    },
    /// Both variables must bind to the same atom.
    Equal { left: Variable, right: Variable },
    /// The variables must bind to different atoms.
    NotEqual { left: Variable, right: Variable },
}

impl Constraint {
    /// Exact type restriction.
    pub fn of_type(variable: impl Into<String>, atom_type: AtomType) -> Self {
        Self::Type {
            variable: variable.into(),
            atom_type,
            include_subtypes: false,
        }
    }

    /// Type restriction admitting subtypes.
    pub fn of_kind(variable: impl Into<String>, atom_type: AtomType) -> Self {
        Self::Type {
            variable: variable.into(),
            atom_type,
            include_subtypes: true,
        }
    }

    pub fn equal(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Equal {
            left: a.into(),
            right: b.into(),
        }
    }

    pub fn not_equal(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::NotEqual {
            left: a.into(),
            right: b.into(),
        }
    }

    /// Variables this constraint mentions.
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Self::Type { variable, .. } => vec![variable.as_str()],
            Self::Equal { left, right } | Self::NotEqual { left, right } => {
                vec![left.as_str(), right.as_str()]
            }
        }
    }
}
