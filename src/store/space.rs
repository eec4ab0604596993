//! The authoritative atom registry.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::index::AtomIndex;
use super::types::{AtomRecord, ForceRemovalAudit, RemoveMode, SpaceId, SpaceStats};
use crate::atom::{Atom, AtomExpr, AtomType, AttentionValue, Handle, TruthValue};
use crate::attention::{AttentionBank, AttentionConfig, GoalRegistry};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct StoredAtom {
    pub atom: Atom,
    pub tv: TruthValue,
}

/// Atom arena plus indices, guarded by the structural lock.
#[derive(Debug, Default)]
pub(crate) struct AtomTable {
    pub atoms: HashMap<Handle, StoredAtom>,
    pub index: AtomIndex,
    next_handle: u64,
}

impl AtomTable {
    pub fn get(&self, handle: Handle) -> Option<&Atom> {
        self.atoms.get(&handle).map(|s| &s.atom)
    }

    /// Handles of atoms of `atom_type`, optionally including subtypes.
    pub fn handles_of_type(&self, atom_type: &AtomType, include_subtypes: bool) -> Vec<Handle> {
        if include_subtypes {
            let mut all: Vec<Handle> = self
                .index
                .subtypes_present(atom_type)
                .flat_map(|(_, set)| set.iter().copied())
                .collect();
            all.sort();
            all
        } else {
            self.index
                .by_type(atom_type)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        }
    }

    pub fn count_of_type(&self, atom_type: &AtomType) -> usize {
        self.index.by_type(atom_type).map_or(0, BTreeSet::len)
    }

    pub fn incoming(&self, handle: Handle) -> Vec<Handle> {
        self.index
            .incoming(handle)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn allocate(&mut self) -> Handle {
        self.next_handle += 1;
        Handle::new(self.next_handle)
    }
}

/// Hypergraph knowledge store.
///
/// Structural mutation takes the table's write lock; attention updates go
/// through the [`AttentionBank`]'s own lock. Lock order is always table
/// first, bank second.
pub struct AtomSpace {
    id: SpaceId,
    table: RwLock<AtomTable>,
    bank: Arc<AttentionBank>,
    goals: GoalRegistry,
    audit: Mutex<Vec<ForceRemovalAudit>>,
}

impl AtomSpace {
    /// Create an empty store with the default attention economy.
    pub fn new() -> Self {
        Self::from_bank(AttentionBank::default())
    }

    /// Create an empty store with a custom attention economy.
    pub fn with_config(config: AttentionConfig) -> Result<Self> {
        Ok(Self::from_bank(AttentionBank::new(config)?))
    }

    fn from_bank(bank: AttentionBank) -> Self {
        let id = SpaceId::new();
        debug!(space = %id, "created atom space");
        Self {
            id,
            table: RwLock::new(AtomTable::default()),
            bank: Arc::new(bank),
            goals: GoalRegistry::new(),
            audit: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// The attention bank tracking this store's atoms.
    pub fn attention(&self) -> &Arc<AttentionBank> {
        &self.bank
    }

    /// Goals that bias stimulation.
    pub fn goals(&self) -> &GoalRegistry {
        &self.goals
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, AtomTable>> {
        self.table.read().map_err(|_| Error::poisoned("atom table"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AtomTable>> {
        self.table.write().map_err(|_| Error::poisoned("atom table"))
    }

    // ==================== Insertion ====================

    /// Add a node, or return the existing one with the same type and name.
    ///
    /// A truth value given for an existing node is merged into the stored one.
    pub fn add_node(
        &self,
        atom_type: AtomType,
        name: impl Into<String>,
        tv: Option<TruthValue>,
    ) -> Result<Handle> {
        let atom_type = atom_type.canonical()?;
        if !atom_type.is_node() || atom_type.is_abstract() {
            return Err(Error::validation(format!(
                "{} is not a concrete node type",
                atom_type
            )));
        }
        self.insert(
            Atom::Node {
                atom_type,
                name: name.into(),
            },
            tv,
        )
    }

    /// Add a link, or return the existing one with the same type and outgoing set.
    ///
    /// Every outgoing handle must resolve to a live atom.
    pub fn add_link(
        &self,
        atom_type: AtomType,
        outgoing: &[Handle],
        tv: Option<TruthValue>,
    ) -> Result<Handle> {
        let atom_type = atom_type.canonical()?;
        if !atom_type.is_link() || atom_type.is_abstract() {
            return Err(Error::validation(format!(
                "{} is not a concrete link type",
                atom_type
            )));
        }
        self.insert(
            Atom::Link {
                atom_type,
                outgoing: outgoing.to_vec(),
            },
            tv,
        )
    }

    fn insert(&self, atom: Atom, tv: Option<TruthValue>) -> Result<Handle> {
        let tv = tv
            .map(|tv| TruthValue::new(tv.strength, tv.confidence))
            .transpose()?;
        let mut table = self.write()?;

        if let Some(existing) = table.index.lookup(&atom) {
            if let (Some(tv), Some(stored)) = (tv, table.atoms.get_mut(&existing)) {
                stored.tv = stored.tv.merge(&tv);
            }
            return Ok(existing);
        }

        if let Some(dangling) = atom.outgoing().iter().find(|h| !table.atoms.contains_key(*h)) {
            return Err(Error::validation_for(
                *dangling,
                format!("{} references a missing atom", atom.atom_type()),
            ));
        }

        let handle = table.allocate();
        table.index.insert(handle, &atom);
        table.atoms.insert(
            handle,
            StoredAtom {
                atom,
                tv: tv.unwrap_or_default(),
            },
        );
        self.bank.register(handle)?;
        Ok(handle)
    }

    /// Intern an expression tree, returning the root handle.
    pub fn add_expr(&self, expr: &AtomExpr) -> Result<Handle> {
        match expr {
            AtomExpr::Node {
                atom_type,
                name,
                tv,
            } => self.add_node(atom_type.clone(), name.clone(), *tv),
            AtomExpr::Link {
                atom_type,
                outgoing,
                tv,
            } => {
                let handles = outgoing
                    .iter()
                    .map(|child| self.add_expr(child))
                    .collect::<Result<Vec<_>>>()?;
                self.add_link(atom_type.clone(), &handles, *tv)
            }
        }
    }

    // ==================== Lookup ====================

    pub fn get_atom(&self, handle: Handle) -> Result<Atom> {
        self.read()?
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::handle_not_found(handle))
    }

    /// Whether `handle` names a live atom.
    ///
    /// A poisoned table lock reads as absent; use [`get_atom`](Self::get_atom)
    /// to surface the lock error.
    pub fn contains(&self, handle: Handle) -> bool {
        self.read().map(|t| t.atoms.contains_key(&handle)).unwrap_or(false)
    }

    /// Handle of the node with this type and name.
    pub fn get_node(&self, atom_type: &AtomType, name: &str) -> Result<Handle> {
        let atom_type = atom_type.clone().canonical()?;
        self.read()?
            .index
            .lookup_node(&atom_type, name)
            .ok_or_else(|| Error::not_found(format!("{} \"{}\"", atom_type, name)))
    }

    /// Handle of the link with this type and outgoing set, if present.
    pub fn find_link(&self, atom_type: &AtomType, outgoing: &[Handle]) -> Result<Option<Handle>> {
        Ok(self.read()?.index.lookup(&Atom::Link {
            atom_type: atom_type.clone().canonical()?,
            outgoing: outgoing.to_vec(),
        }))
    }

    /// Snapshot of atoms of a type, in handle order.
    pub fn get_atoms_by_type(&self, atom_type: &AtomType, include_subtypes: bool) -> Result<Vec<Handle>> {
        Ok(self.read()?.handles_of_type(atom_type, include_subtypes))
    }

    /// Snapshot of nodes with this name, across all node types.
    pub fn get_atoms_by_name(&self, name: &str) -> Result<Vec<Handle>> {
        Ok(self
            .read()?
            .index
            .by_name(name)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Links that contain `handle` in their outgoing set.
    pub fn get_incoming(&self, handle: Handle) -> Result<Vec<Handle>> {
        let table = self.read()?;
        if !table.atoms.contains_key(&handle) {
            return Err(Error::handle_not_found(handle));
        }
        Ok(table.incoming(handle))
    }

    pub fn get_outgoing(&self, handle: Handle) -> Result<Vec<Handle>> {
        self.read()?
            .get(handle)
            .map(|atom| atom.outgoing().to_vec())
            .ok_or_else(|| Error::handle_not_found(handle))
    }

    /// All live handles in ascending order.
    pub fn handles(&self) -> Result<Vec<Handle>> {
        let mut all: Vec<Handle> = self.read()?.atoms.keys().copied().collect();
        all.sort();
        Ok(all)
    }

    /// Number of live atoms; 0 if the table lock is poisoned.
    ///
    /// [`stats`](Self::stats) reports the same count and surfaces lock errors.
    pub fn size(&self) -> usize {
        self.read().map(|t| t.atoms.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // ==================== Values ====================

    pub fn get_truth_value(&self, handle: Handle) -> Result<TruthValue> {
        self.read()?
            .atoms
            .get(&handle)
            .map(|s| s.tv)
            .ok_or_else(|| Error::handle_not_found(handle))
    }

    /// Replace an atom's truth value.
    pub fn set_truth_value(&self, handle: Handle, tv: TruthValue) -> Result<()> {
        TruthValue::new(tv.strength, tv.confidence)
            .map_err(|e| Error::validation_for(handle, e.to_string()))?;
        let mut table = self.write()?;
        let stored = table
            .atoms
            .get_mut(&handle)
            .ok_or_else(|| Error::handle_not_found(handle))?;
        stored.tv = tv;
        Ok(())
    }

    pub fn get_attention(&self, handle: Handle) -> Result<AttentionValue> {
        self.bank.get_attention(handle)
    }

    pub fn set_attention(&self, handle: Handle, av: AttentionValue) -> Result<()> {
        self.bank.set_attention(handle, av)
    }

    /// Stimulate an atom; absent handles are ignored.
    pub fn stimulate(&self, handle: Handle, amount: i32) -> Result<i32> {
        self.bank.stimulate(handle, amount)
    }

    /// Stimulate an atom, scaled by the weight of any goal it serves.
    pub fn stimulate_goal_weighted(&self, handle: Handle, amount: i32) -> Result<i32> {
        let factor = self.goals.multiplier(handle)?;
        let scaled = (f64::from(amount) * factor).round();
        let scaled = scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        self.bank.stimulate(handle, scaled)
    }

    // ==================== Removal ====================

    /// Remove an atom, returning every handle removed (dependents first).
    pub fn remove_atom(&self, handle: Handle, mode: RemoveMode) -> Result<Vec<Handle>> {
        let mut table = self.write()?;
        if !table.atoms.contains_key(&handle) {
            return Err(Error::handle_not_found(handle));
        }

        let removed = match mode {
            RemoveMode::Strict => {
                let dependents = table.incoming(handle);
                if !dependents.is_empty() {
                    return Err(Error::ReferenceIntegrity { handle, dependents });
                }
                vec![handle]
            }
            RemoveMode::Recursive => Self::dependent_closure(&table, handle),
            RemoveMode::Force => {
                let audits = Self::strip_from_dependents(&mut table, handle);
                if !audits.is_empty() {
                    warn!(
                        %handle,
                        links = ?audits.iter().map(|a| a.link).collect::<Vec<_>>(),
                        "force removal rewrote dependent links"
                    );
                    self.audit
                        .lock()
                        .map_err(|_| Error::poisoned("audit log"))?
                        .extend(audits);
                }
                vec![handle]
            }
        };

        for h in &removed {
            if let Some(stored) = table.atoms.remove(h) {
                table.index.remove(*h, &stored.atom);
            }
            self.bank.unregister(*h)?;
        }
        debug!(%handle, ?mode, count = removed.len(), "removed atoms");
        Ok(removed)
    }

    /// `root` plus everything that transitively references it, in a safe
    /// removal order.
    fn dependent_closure(table: &AtomTable, root: Handle) -> Vec<Handle> {
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(next) = queue.pop_front() {
            for dependent in table.incoming(next) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        // A link is always newer than its targets, so descending handle
        // order removes every dependent before what it points at.
        seen.into_iter().rev().collect()
    }

    fn strip_from_dependents(table: &mut AtomTable, handle: Handle) -> Vec<ForceRemovalAudit> {
        let mut audits = Vec::new();
        for link in table.incoming(handle) {
            let Some(stored) = table.atoms.get(&link) else {
                continue;
            };
            let Atom::Link { atom_type, outgoing } = stored.atom.clone() else {
                continue;
            };
            let new_outgoing: Vec<Handle> =
                outgoing.iter().copied().filter(|h| *h != handle).collect();
            let still_unique =
                table
                    .index
                    .rekey_link(link, &atom_type, &outgoing, &new_outgoing);
            if let Some(stored) = table.atoms.get_mut(&link) {
                stored.atom = Atom::Link {
                    atom_type,
                    outgoing: new_outgoing.clone(),
                };
            }
            audits.push(ForceRemovalAudit {
                removed: handle,
                link,
                old_outgoing: outgoing,
                new_outgoing,
                still_unique,
                timestamp: Utc::now(),
            });
        }
        audits
    }

    /// Links rewritten by forced removals, oldest first.
    pub fn audit_log(&self) -> Result<Vec<ForceRemovalAudit>> {
        Ok(self
            .audit
            .lock()
            .map_err(|_| Error::poisoned("audit log"))?
            .clone())
    }

    /// Remove every atom. Handles are not reused afterwards.
    pub fn clear(&self) -> Result<()> {
        let mut table = self.write()?;
        let count = table.atoms.len();
        table.atoms.clear();
        table.index.clear();
        self.bank.unregister_all()?;
        info!(space = %self.id, count, "cleared atom space");
        Ok(())
    }

    // ==================== Export ====================

    /// Detached tree form of an atom, with its truth value on the root.
    pub fn atom_expr(&self, handle: Handle) -> Result<AtomExpr> {
        let table = self.read()?;
        let tv = table
            .atoms
            .get(&handle)
            .map(|s| s.tv)
            .ok_or_else(|| Error::handle_not_found(handle))?;
        Ok(Self::expr_of(&table, handle)?.with_tv(tv))
    }

    fn expr_of(table: &AtomTable, handle: Handle) -> Result<AtomExpr> {
        match table.get(handle) {
            Some(Atom::Node { atom_type, name }) => Ok(AtomExpr::node(atom_type.clone(), name)),
            Some(Atom::Link { atom_type, outgoing }) => {
                let children = outgoing
                    .iter()
                    .map(|h| Self::expr_of(table, *h))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AtomExpr::link(atom_type.clone(), children))
            }
            None => Err(Error::handle_not_found(handle)),
        }
    }

    /// Textual form of an atom.
    pub fn render(&self, handle: Handle) -> Result<String> {
        Ok(crate::atom::render(&self.atom_expr(handle)?))
    }

    /// Every atom with its values, in handle order.
    pub fn records(&self) -> Result<Vec<AtomRecord>> {
        let table = self.read()?;
        let mut handles: Vec<Handle> = table.atoms.keys().copied().collect();
        handles.sort();
        handles
            .into_iter()
            .map(|handle| {
                let stored = &table.atoms[&handle];
                Ok(AtomRecord {
                    handle,
                    atom: stored.atom.clone(),
                    tv: stored.tv,
                    av: self.bank.get_attention(handle)?,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> Result<SpaceStats> {
        let table = self.read()?;
        let atoms_by_type: HashMap<AtomType, usize> = table
            .index
            .type_counts()
            .map(|(t, n)| (t.clone(), n))
            .collect();
        let nodes: usize = atoms_by_type
            .iter()
            .filter(|(t, _)| t.is_node())
            .map(|(_, n)| n)
            .sum();
        Ok(SpaceStats {
            total_atoms: table.atoms.len(),
            nodes,
            links: table.atoms.len() - nodes,
            atoms_by_type,
            force_removals: self
                .audit
                .lock()
                .map_err(|_| Error::poisoned("audit log"))?
                .len(),
        })
    }
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpace")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn concept(space: &AtomSpace, name: &str) -> Handle {
        space.add_node(AtomType::ConceptNode, name, None).unwrap()
    }

    fn inherit(space: &AtomSpace, a: Handle, b: Handle) -> Handle {
        space
            .add_link(AtomType::InheritanceLink, &[a, b], None)
            .unwrap()
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let space = AtomSpace::new();
        let a = concept(&space, "dog");
        let b = concept(&space, "dog");
        assert_eq!(a, b);
        assert_eq!(space.size(), 1);
    }

    #[test]
    fn test_same_name_different_type() {
        let space = AtomSpace::new();
        let c = concept(&space, "run");
        let w = space.add_node(AtomType::WordNode, "run", None).unwrap();
        assert_ne!(c, w);
        assert_eq!(space.get_atoms_by_name("run").unwrap(), vec![c, w]);
    }

    #[test]
    fn test_add_node_merges_truth_value() {
        let space = AtomSpace::new();
        let tv1 = TruthValue::new(1.0, 0.5).unwrap();
        let tv2 = TruthValue::new(0.0, 0.5).unwrap();
        let h = space.add_node(AtomType::ConceptNode, "x", Some(tv1)).unwrap();
        space.add_node(AtomType::ConceptNode, "x", Some(tv2)).unwrap();
        let tv = space.get_truth_value(h).unwrap();
        assert!((tv.strength - 0.5).abs() < 1e-12);
        assert!((tv.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_add_link_is_idempotent_and_indexed() {
        let space = AtomSpace::new();
        let dog = concept(&space, "dog");
        let mammal = concept(&space, "mammal");
        let l1 = inherit(&space, dog, mammal);
        let l2 = inherit(&space, dog, mammal);
        assert_eq!(l1, l2);
        assert_eq!(space.get_incoming(dog).unwrap(), vec![l1]);
        assert_eq!(space.get_incoming(mammal).unwrap(), vec![l1]);
        assert_eq!(space.get_outgoing(l1).unwrap(), vec![dog, mammal]);
        assert_eq!(
            space
                .get_atoms_by_type(&AtomType::InheritanceLink, false)
                .unwrap(),
            vec![l1]
        );
        // Order matters for identity.
        assert_ne!(inherit(&space, mammal, dog), l1);
    }

    #[test]
    fn test_add_link_rejects_dangling() {
        let space = AtomSpace::new();
        let dog = concept(&space, "dog");
        let err = space
            .add_link(AtomType::InheritanceLink, &[dog, Handle::new(999)], None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.handle(), Some(Handle::new(999)));
        assert_eq!(space.size(), 1);
    }

    #[test]
    fn test_add_rejects_out_of_range_truth_value() {
        let space = AtomSpace::new();
        let bad = TruthValue {
            strength: 7.5,
            confidence: -3.0,
        };
        let err = space
            .add_node(AtomType::ConceptNode, "x", Some(bad))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(space.is_empty());

        // Merging into an existing atom is rejected the same way.
        let x = concept(&space, "x");
        assert!(space.add_node(AtomType::ConceptNode, "x", Some(bad)).is_err());
        assert!(space.add_link(AtomType::ListLink, &[x], Some(bad)).is_err());
        assert_eq!(space.get_truth_value(x).unwrap(), TruthValue::default());
        assert_eq!(space.size(), 1);
    }

    #[test]
    fn test_custom_type_with_builtin_name_is_canonical() {
        let space = AtomSpace::new();
        let dog = concept(&space, "dog");
        let alias = space
            .add_node(AtomType::Custom("ConceptNode".to_string()), "dog", None)
            .unwrap();
        assert_eq!(alias, dog);
        assert_eq!(space.size(), 1);
        assert_eq!(space.get_atom(dog).unwrap().atom_type(), &AtomType::ConceptNode);
        assert_eq!(
            space
                .get_node(&AtomType::Custom("ConceptNode".to_string()), "dog")
                .unwrap(),
            dog
        );

        let err = space
            .add_node(AtomType::Custom("concept".to_string()), "dog", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(space
            .add_link(AtomType::Custom("ConceptNode".to_string()), &[dog], None)
            .is_err());
    }

    #[test]
    fn test_type_checks() {
        let space = AtomSpace::new();
        assert!(space.add_node(AtomType::ListLink, "x", None).is_err());
        assert!(space.add_node(AtomType::Node, "x", None).is_err());
        assert!(space.add_link(AtomType::ConceptNode, &[], None).is_err());
    }

    #[test]
    fn test_get_atoms_by_type_with_subtypes() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        let p = space.add_node(AtomType::PredicateNode, "p", None).unwrap();
        let l = space.add_link(AtomType::ListLink, &[a, p], None).unwrap();

        assert_eq!(
            space.get_atoms_by_type(&AtomType::Node, true).unwrap(),
            vec![a, p]
        );
        assert_eq!(
            space.get_atoms_by_type(&AtomType::Atom, true).unwrap(),
            vec![a, p, l]
        );
        assert!(space
            .get_atoms_by_type(&AtomType::Node, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_strict_removal_blocked_until_link_removed() {
        let space = AtomSpace::new();
        let dog = concept(&space, "dog");
        let mammal = concept(&space, "mammal");
        let link = inherit(&space, dog, mammal);

        let err = space.remove_atom(mammal, RemoveMode::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceIntegrity);
        assert_eq!(err.handle(), Some(mammal));

        space.remove_atom(link, RemoveMode::Strict).unwrap();
        assert_eq!(space.remove_atom(mammal, RemoveMode::Strict).unwrap(), vec![mammal]);
        assert!(space.get_incoming(dog).unwrap().is_empty());
        assert_eq!(space.size(), 1);
    }

    #[test]
    fn test_recursive_removal_order() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        let b = concept(&space, "b");
        let ab = space.add_link(AtomType::ListLink, &[a, b], None).unwrap();
        let nested = space.add_link(AtomType::ListLink, &[ab, a], None).unwrap();

        let removed = space.remove_atom(a, RemoveMode::Recursive).unwrap();
        assert_eq!(removed, vec![nested, ab, a]);
        assert_eq!(space.handles().unwrap(), vec![b]);
        assert!(space.get_incoming(b).unwrap().is_empty());
    }

    #[test]
    fn test_force_removal_strips_and_audits() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        let b = concept(&space, "b");
        let ab = space.add_link(AtomType::ListLink, &[a, b], None).unwrap();

        space.remove_atom(a, RemoveMode::Force).unwrap();
        assert_eq!(space.get_outgoing(ab).unwrap(), vec![b]);
        assert_eq!(
            space.find_link(&AtomType::ListLink, &[b]).unwrap(),
            Some(ab)
        );

        let audit = space.audit_log().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].link, ab);
        assert_eq!(audit[0].old_outgoing, vec![a, b]);
        assert!(audit[0].still_unique);
        assert_eq!(space.stats().unwrap().force_removals, 1);
    }

    #[test]
    fn test_handles_not_reused() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        space.remove_atom(a, RemoveMode::Strict).unwrap();
        let again = concept(&space, "a");
        assert!(again > a);

        space.clear().unwrap();
        assert!(space.is_empty());
        assert!(concept(&space, "a") > again);
    }

    #[test]
    fn test_removal_releases_attention() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        space.stimulate(a, 250).unwrap();
        assert_eq!(space.attention().sti_funds().unwrap(), 9_750);
        space.remove_atom(a, RemoveMode::Strict).unwrap();
        assert_eq!(space.attention().sti_funds().unwrap(), 10_000);
        // Attention on a removed atom is optional metadata: no error.
        assert_eq!(space.stimulate(a, 10).unwrap(), 0);
    }

    #[test]
    fn test_not_found() {
        let space = AtomSpace::new();
        assert_eq!(
            space.get_atom(Handle::new(3)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let err = space.get_node(&AtomType::ConceptNode, "ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.identifier().unwrap().contains("ghost"));
    }

    #[test]
    fn test_expr_round_trip() {
        let space = AtomSpace::new();
        let expr = crate::atom::parse(
            r#"(InheritanceLink (ConceptNode "dog") (ConceptNode "mammal") (stv 0.9 0.8))"#,
        )
        .unwrap();
        let h = space.add_expr(&expr).unwrap();
        assert_eq!(space.size(), 3);
        assert_eq!(space.atom_expr(h).unwrap(), expr);
        assert_eq!(
            space.render(h).unwrap(),
            r#"(InheritanceLink (ConceptNode "dog") (ConceptNode "mammal") (stv 0.9 0.8))"#
        );
    }

    #[test]
    fn test_poisoned_table_lock() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = space.table.write().unwrap();
                panic!("writer died holding the table lock");
            });
            assert!(poisoner.join().is_err());
        });

        assert!(!space.contains(a));
        assert_eq!(space.size(), 0);
        assert_eq!(space.get_atom(a).unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(space.stats().unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_poisoned_audit_log_is_an_error() {
        let space = AtomSpace::new();
        concept(&space, "a");
        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = space.audit.lock().unwrap();
                panic!("writer died holding the audit lock");
            });
            assert!(poisoner.join().is_err());
        });

        assert_eq!(space.stats().unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(space.audit_log().unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_stats() {
        let space = AtomSpace::new();
        let a = concept(&space, "a");
        let b = concept(&space, "b");
        inherit(&space, a, b);
        let stats = space.stats().unwrap();
        assert_eq!(stats.total_atoms, 3);
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.links, 1);
        assert_eq!(stats.atoms_by_type.get(&AtomType::ConceptNode), Some(&2));
    }
}
