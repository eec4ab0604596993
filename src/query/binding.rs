//! Variable bindings produced by the matcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::pattern::Pattern;
use crate::atom::Handle;

/// One successful assignment of variables to atoms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    values: BTreeMap<String, Handle>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, variable: impl Into<String>, handle: Handle) -> Self {
        self.values.insert(variable.into(), handle);
        self
    }

    pub fn get(&self, variable: &str) -> Option<Handle> {
        self.values.get(variable).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Handle)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.values.values().copied()
    }

    /// True if both bindings agree on every variable they share.
    pub fn is_compatible(&self, other: &Binding) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .values
            .iter()
            .all(|(k, v)| large.values.get(k).map_or(true, |w| w == v))
    }

    /// Union of two compatible bindings.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), *v)));
        Some(Binding { values })
    }

    /// Replace bound variables in `pattern` with their handles.
    ///
    /// Unbound variables are left in place.
    pub fn substitute(&self, pattern: &Pattern) -> Pattern {
        match pattern {
            Pattern::Variable { name } => match self.get(name) {
                Some(handle) => Pattern::handle(handle),
                None => pattern.clone(),
            },
            Pattern::Link {
                atom_type,
                outgoing,
            } => Pattern::link(
                atom_type.clone(),
                outgoing.iter().map(|p| self.substitute(p)).collect(),
            ),
            Pattern::Handle { .. } | Pattern::Node { .. } => pattern.clone(),
        }
    }

    pub(crate) fn from_map(values: BTreeMap<String, Handle>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Handle)> for Binding {
    fn from_iter<T: IntoIterator<Item = (String, Handle)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
