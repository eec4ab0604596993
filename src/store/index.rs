//! Secondary indices over the atom table.
//!
//! Every structural mutation goes through [`AtomIndex::insert`] and
//! [`AtomIndex::remove`], which keep the dedup keys, the type and name
//! indices and the incoming (reverse-edge) sets consistent with each other.

use std::collections::{BTreeSet, HashMap};

use crate::atom::{Atom, AtomType, Handle};

/// Dedup key for a node.
type NodeKey = (AtomType, String);
/// Dedup key for a link.
type LinkKey = (AtomType, Vec<Handle>);

#[derive(Debug, Default)]
pub(crate) struct AtomIndex {
    nodes: HashMap<NodeKey, Handle>,
    links: HashMap<LinkKey, Handle>,
    by_type: HashMap<AtomType, BTreeSet<Handle>>,
    by_name: HashMap<String, BTreeSet<Handle>>,
    incoming: HashMap<Handle, BTreeSet<Handle>>,
}

impl AtomIndex {
    /// Existing handle for a structurally identical atom.
    pub fn lookup(&self, atom: &Atom) -> Option<Handle> {
        match atom {
            Atom::Node { atom_type, name } => {
                self.nodes.get(&(atom_type.clone(), name.clone())).copied()
            }
            Atom::Link { atom_type, outgoing } => {
                self.links.get(&(atom_type.clone(), outgoing.clone())).copied()
            }
        }
    }

    pub fn lookup_node(&self, atom_type: &AtomType, name: &str) -> Option<Handle> {
        self.nodes.get(&(atom_type.clone(), name.to_string())).copied()
    }

    pub fn insert(&mut self, handle: Handle, atom: &Atom) {
        match atom {
            Atom::Node { atom_type, name } => {
                self.nodes.insert((atom_type.clone(), name.clone()), handle);
                self.by_name.entry(name.clone()).or_default().insert(handle);
            }
            Atom::Link { atom_type, outgoing } => {
                self.links
                    .entry((atom_type.clone(), outgoing.clone()))
                    .or_insert(handle);
                for target in outgoing {
                    self.incoming.entry(*target).or_default().insert(handle);
                }
            }
        }
        self.by_type
            .entry(atom.atom_type().clone())
            .or_default()
            .insert(handle);
    }

    pub fn remove(&mut self, handle: Handle, atom: &Atom) {
        match atom {
            Atom::Node { atom_type, name } => {
                self.nodes.remove(&(atom_type.clone(), name.clone()));
                remove_from(&mut self.by_name, name, handle);
            }
            Atom::Link { atom_type, outgoing } => {
                let key = (atom_type.clone(), outgoing.clone());
                if self.links.get(&key) == Some(&handle) {
                    self.links.remove(&key);
                }
                for target in outgoing {
                    remove_from(&mut self.incoming, target, handle);
                }
            }
        }
        remove_from(&mut self.by_type, atom.atom_type(), handle);
        self.incoming.remove(&handle);
    }

    /// Re-key a link whose outgoing set changed in place.
    ///
    /// Returns false when the new key already belongs to another link; the
    /// re-keyed link then stays reachable through the type and incoming
    /// indices but not through dedup lookup.
    pub fn rekey_link(
        &mut self,
        handle: Handle,
        atom_type: &AtomType,
        old: &[Handle],
        new: &[Handle],
    ) -> bool {
        let old_key = (atom_type.clone(), old.to_vec());
        if self.links.get(&old_key) == Some(&handle) {
            self.links.remove(&old_key);
        }
        for target in old {
            if !new.contains(target) {
                remove_from(&mut self.incoming, target, handle);
            }
        }
        for target in new {
            self.incoming.entry(*target).or_default().insert(handle);
        }
        match self.links.entry((atom_type.clone(), new.to_vec())) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub fn by_type(&self, atom_type: &AtomType) -> Option<&BTreeSet<Handle>> {
        self.by_type.get(atom_type)
    }

    /// All concrete types currently present that inherit from `atom_type`.
    pub fn subtypes_present<'a>(
        &'a self,
        atom_type: &'a AtomType,
    ) -> impl Iterator<Item = (&'a AtomType, &'a BTreeSet<Handle>)> + 'a {
        self.by_type.iter().filter(move |(t, _)| t.is_a(atom_type))
    }

    pub fn by_name(&self, name: &str) -> Option<&BTreeSet<Handle>> {
        self.by_name.get(name)
    }

    pub fn incoming(&self, handle: Handle) -> Option<&BTreeSet<Handle>> {
        self.incoming.get(&handle)
    }

    pub fn incoming_len(&self, handle: Handle) -> usize {
        self.incoming.get(&handle).map_or(0, BTreeSet::len)
    }

    pub fn type_counts(&self) -> impl Iterator<Item = (&AtomType, usize)> {
        self.by_type.iter().map(|(t, set)| (t, set.len()))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.by_type.clear();
        self.by_name.clear();
        self.incoming.clear();
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, BTreeSet<Handle>>, key: &Q, handle: Handle)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(set) = map.get_mut(key) {
        set.remove(&handle);
        if set.is_empty() {
            map.remove(key);
        }
    }
}
