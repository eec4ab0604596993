//! Persistence gateway.
//!
//! A [`StorageGateway`] checkpoints and restores whole-store snapshots. All
//! backends behave the same from the store's point of view: an atom written
//! with `store_atom` can later be fetched by its handle, and `load_all`
//! rebuilds an equivalent graph in another store. Snapshot and restore
//! assume the store is quiesced; callers suspend writers around them.
//!
//! Backends keep one flat record per atom. Links refer to their targets by
//! stored handle, so capture and restore cost is linear in the number of
//! atoms however much structure the links share:
//!
//! ```text
//! (ConceptNode "dog" (stv 0.9 0.8))
//! (InheritanceLink #1 #2 (stv 1 0.1))
//! ```
//!
//! Restored atoms receive fresh handles (in the original handle order), so
//! `load_all` returns the mapping from stored to new handles.

mod memory;
mod schema;
mod sqlite;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::atom::text::{parse_stv, quote, read_all, SExpr};
use crate::atom::{Atom, AtomType, AttentionValue, Handle, TruthValue};
use crate::error::{Error, Result};
use crate::store::AtomSpace;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// An atom as a backend holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAtom {
    pub handle: Handle,
    pub atom_type: AtomType,
    /// Node name; `None` for links.
    pub name: Option<String>,
    /// Stored handles of a link's targets; empty for nodes.
    pub outgoing: Vec<Handle>,
    pub tv: TruthValue,
    pub av: AttentionValue,
}

impl PersistedAtom {
    /// Capture an atom from a store.
    pub fn capture(space: &AtomSpace, handle: Handle) -> Result<Self> {
        let (atom_type, name, outgoing) = match space.get_atom(handle)? {
            Atom::Node { atom_type, name } => (atom_type, Some(name), Vec::new()),
            Atom::Link {
                atom_type,
                outgoing,
            } => (atom_type, None, outgoing),
        };
        Ok(Self {
            handle,
            atom_type,
            name,
            outgoing,
            tv: space.get_truth_value(handle)?,
            av: space.get_attention(handle)?,
        })
    }

    pub fn is_link(&self) -> bool {
        self.name.is_none()
    }

    /// One-line text record. Attention is not part of it.
    pub fn to_record(&self) -> String {
        let mut out = format!("({}", self.atom_type);
        match &self.name {
            Some(name) => {
                out.push(' ');
                out.push_str(&quote(name));
            }
            None => {
                for target in &self.outgoing {
                    out.push_str(&format!(" {}", target));
                }
            }
        }
        out.push_str(&format!(" (stv {} {}))", self.tv.strength, self.tv.confidence));
        out
    }

    /// Read a record written by [`to_record`](Self::to_record).
    pub fn from_record(handle: Handle, record: &str, av: AttentionValue) -> Result<Self> {
        let exprs = read_all(record).map_err(|e| Error::parse(e.message, e.offset))?;
        let (items, offset) = match exprs.as_slice() {
            [SExpr::List(items, offset)] => (items, *offset),
            _ => return Err(Error::parse("Expected one parenthesized record", 0)),
        };
        let atom_type = match items.first() {
            Some(SExpr::Symbol(name, o)) => {
                AtomType::from_name(name).map_err(|e| Error::parse(e.to_string(), *o))?
            }
            _ => return Err(Error::parse("Expected atom type", offset)),
        };
        let (tv, rest) = match items[1..].split_last() {
            Some((SExpr::List(stv, o), rest))
                if matches!(stv.first(), Some(SExpr::Symbol(s, _)) if s == "stv") =>
            {
                (parse_stv(stv, *o)?, rest)
            }
            _ => return Err(Error::parse("Record lacks a truth value", offset)),
        };

        let (name, outgoing) = if atom_type.is_node() {
            match rest {
                [SExpr::Str(name, _)] => (Some(name.clone()), Vec::new()),
                _ => {
                    return Err(Error::parse(
                        format!("{} expects exactly one quoted name", atom_type),
                        offset,
                    ))
                }
            }
        } else {
            let outgoing = rest
                .iter()
                .map(|item| match item {
                    SExpr::Symbol(s, o) => s
                        .strip_prefix('#')
                        .and_then(|n| n.parse::<u64>().ok())
                        .map(Handle::new)
                        .ok_or_else(|| Error::parse(format!("Invalid handle '{}'", s), *o)),
                    other => Err(Error::parse("Expected a handle", other.offset())),
                })
                .collect::<Result<Vec<_>>>()?;
            (None, outgoing)
        };

        Ok(Self {
            handle,
            atom_type,
            name,
            outgoing,
            tv,
            av,
        })
    }
}

/// Persistence contract shared by every backend.
pub trait StorageGateway: Send {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Connect. Returns false if already connected.
    fn open(&mut self) -> Result<bool>;

    /// Disconnect. Returns false if not connected.
    fn close(&mut self) -> Result<bool>;

    fn is_connected(&self) -> bool;

    /// Write one atom, replacing any earlier record under its handle.
    fn store_atom(&mut self, atom: &PersistedAtom) -> Result<bool>;

    fn fetch_atom(&self, handle: Handle) -> Result<Option<PersistedAtom>>;

    /// Returns false if nothing was stored under `handle`.
    fn remove_atom(&mut self, handle: Handle) -> Result<bool>;

    /// Every stored atom in handle order.
    fn fetch_all(&self) -> Result<Vec<PersistedAtom>>;

    /// Drop every stored atom.
    fn clear(&mut self) -> Result<()>;

    /// Backend counters, e.g. `atoms`, `writes`, `reads`.
    fn stats(&self) -> Result<BTreeMap<String, u64>>;

    /// Replace the stored snapshot with the whole of `space`.
    ///
    /// Returns the number of atoms written.
    #[instrument(skip_all, fields(backend = self.backend(), space = %space.id()))]
    fn store_all(&mut self, space: &AtomSpace) -> Result<usize> {
        self.ensure_connected()?;
        self.clear()?;
        let handles = space.handles()?;
        for handle in &handles {
            self.store_atom(&PersistedAtom::capture(space, *handle)?)?;
        }
        debug!(count = handles.len(), "stored snapshot");
        Ok(handles.len())
    }

    /// Rebuild the stored snapshot inside `space`.
    ///
    /// Returns the mapping from stored handles to the handles in `space`.
    #[instrument(skip_all, fields(backend = self.backend(), space = %space.id()))]
    fn load_all(&mut self, space: &AtomSpace) -> Result<BTreeMap<Handle, Handle>> {
        self.ensure_connected()?;
        let atoms = self.fetch_all()?;
        let remap = restore(space, &atoms)?;
        debug!(count = remap.len(), "loaded snapshot");
        Ok(remap)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::storage(self.backend(), "backend is not open"))
        }
    }
}

/// Intern `atoms` into `space` and restore their values exactly.
///
/// Atoms are processed in stored-handle order. A link is always newer than
/// its targets, so each link's outgoing handles are already remapped when it
/// is interned.
pub fn restore(space: &AtomSpace, atoms: &[PersistedAtom]) -> Result<BTreeMap<Handle, Handle>> {
    let mut ordered: Vec<&PersistedAtom> = atoms.iter().collect();
    ordered.sort_by_key(|a| a.handle);

    let mut remap: BTreeMap<Handle, Handle> = BTreeMap::new();
    for atom in ordered {
        let handle = match &atom.name {
            Some(name) => space.add_node(atom.atom_type.clone(), name.clone(), None)?,
            None => {
                let outgoing = atom
                    .outgoing
                    .iter()
                    .map(|target| {
                        remap.get(target).copied().ok_or_else(|| {
                            Error::validation_for(
                                *target,
                                format!("{} references an atom missing from the snapshot", atom.handle),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                space.add_link(atom.atom_type.clone(), &outgoing, None)?
            }
        };
        space.set_truth_value(handle, atom.tv)?;
        space.set_attention(handle, atom.av)?;
        remap.insert(atom.handle, handle);
    }
    Ok(remap)
}
