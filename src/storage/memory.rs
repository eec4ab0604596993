//! In-process text backend.
//!
//! Keeps one text record per atom, in the same flat form a file backend
//! would write:
//!
//! ```text
//! (ConceptNode "dog" (stv 0.9 0.8))
//! (InheritanceLink #1 #2 (stv 1 0.9))
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::atom::{AttentionValue, Handle};
use crate::error::{Error, Result};

use super::{PersistedAtom, StorageGateway};

const BACKEND: &str = "memory";

#[derive(Debug, Clone)]
struct TextRecord {
    line: String,
    av: AttentionValue,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: BTreeMap<Handle, TextRecord>,
    connected: bool,
    writes: u64,
    /// Records decoded by fetches.
    reads: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records as text, one atom per line in handle order.
    pub fn to_text(&self) -> String {
        self.records
            .values()
            .map(|r| r.line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn check_open(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::storage(BACKEND, "backend is not open"))
        }
    }

    fn decode(&self, handle: Handle, record: &TextRecord) -> Result<PersistedAtom> {
        let atom = PersistedAtom::from_record(handle, &record.line, record.av).map_err(|e| {
            Error::storage(BACKEND, format!("corrupt record for {}: {}", handle, e))
        })?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(atom)
    }
}

impl StorageGateway for MemoryBackend {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn open(&mut self) -> Result<bool> {
        Ok(!std::mem::replace(&mut self.connected, true))
    }

    fn close(&mut self) -> Result<bool> {
        Ok(std::mem::replace(&mut self.connected, false))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn store_atom(&mut self, atom: &PersistedAtom) -> Result<bool> {
        self.check_open()?;
        self.records.insert(
            atom.handle,
            TextRecord {
                line: atom.to_record(),
                av: atom.av,
            },
        );
        self.writes += 1;
        Ok(true)
    }

    fn fetch_atom(&self, handle: Handle) -> Result<Option<PersistedAtom>> {
        self.check_open()?;
        self.records
            .get(&handle)
            .map(|r| self.decode(handle, r))
            .transpose()
    }

    fn remove_atom(&mut self, handle: Handle) -> Result<bool> {
        self.check_open()?;
        Ok(self.records.remove(&handle).is_some())
    }

    fn fetch_all(&self) -> Result<Vec<PersistedAtom>> {
        self.check_open()?;
        self.records
            .iter()
            .map(|(h, r)| self.decode(*h, r))
            .collect()
    }

    fn clear(&mut self) -> Result<()> {
        self.check_open()?;
        self.records.clear();
        Ok(())
    }

    fn stats(&self) -> Result<BTreeMap<String, u64>> {
        Ok(BTreeMap::from([
            ("atoms".to_string(), self.records.len() as u64),
            ("writes".to_string(), self.writes),
            ("reads".to_string(), self.reads.load(Ordering::Relaxed)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fingerprint, sample_space};
    use super::*;
    use crate::atom::AtomType;
    use crate::error::ErrorKind;
    use crate::store::AtomSpace;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let source = sample_space();
        let mut backend = MemoryBackend::new();
        assert!(backend.open().unwrap());
        assert!(!backend.open().unwrap());

        assert_eq!(backend.store_all(&source).unwrap(), source.size());
        let target = AtomSpace::new();
        backend.load_all(&target).unwrap();
        assert_eq!(fingerprint(&target), fingerprint(&source));
        assert_eq!(backend.stats().unwrap()["reads"], source.size() as u64);
    }

    #[test]
    fn test_one_record_per_atom() {
        let source = sample_space();
        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        backend.store_all(&source).unwrap();

        let text = backend.to_text();
        assert_eq!(text.lines().count(), source.size());
        assert!(text.contains(r#"(ConceptNode "dog" (stv 0.9 0.8))"#));
        assert!(text.contains(r#"(ConceptNode "mammal \"warm\"" (stv 0.5 0.5))"#));
        assert!(text.contains("(InheritanceLink #1 #2 (stv 1 0.1))"));
    }

    #[test]
    fn test_fetch_and_remove() {
        let source = sample_space();
        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        let dog = source.handles().unwrap()[0];
        let captured = PersistedAtom::capture(&source, dog).unwrap();
        backend.store_atom(&captured).unwrap();

        let fetched = backend.fetch_atom(dog).unwrap().unwrap();
        assert_eq!(fetched, captured);
        assert!(fetched.av.vlti);

        assert!(backend.remove_atom(dog).unwrap());
        assert!(!backend.remove_atom(dog).unwrap());
        assert!(backend.fetch_atom(dog).unwrap().is_none());
    }

    #[test]
    fn test_every_fetch_counts_as_a_read() {
        let source = sample_space();
        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        backend.store_all(&source).unwrap();
        assert_eq!(backend.stats().unwrap()["reads"], 0);

        let dog = source.handles().unwrap()[0];
        backend.fetch_atom(dog).unwrap();
        assert_eq!(backend.stats().unwrap()["reads"], 1);
        // A miss decodes nothing.
        backend.fetch_atom(Handle::new(999)).unwrap();
        assert_eq!(backend.stats().unwrap()["reads"], 1);

        backend.fetch_all().unwrap();
        assert_eq!(backend.stats().unwrap()["reads"], 1 + source.size() as u64);
        assert_eq!(backend.stats().unwrap()["writes"], source.size() as u64);
    }

    #[test]
    fn test_custom_builtin_type_survives_round_trip() {
        let source = AtomSpace::new();
        source.add_node(AtomType::ConceptNode, "dog", None).unwrap();
        source
            .add_node(AtomType::Custom("ConceptNode".to_string()), "dog", None)
            .unwrap();
        source
            .add_node(AtomType::Custom("GroundedSchemaNode".to_string()), "run", None)
            .unwrap();
        assert_eq!(source.size(), 2);

        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        backend.store_all(&source).unwrap();
        let target = AtomSpace::new();
        backend.load_all(&target).unwrap();
        assert_eq!(target.size(), source.size());
        assert_eq!(fingerprint(&target), fingerprint(&source));
    }

    #[test]
    fn test_closed_backend_is_storage_error() {
        let source = sample_space();
        let mut backend = MemoryBackend::new();
        let err = backend.store_all(&source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        backend.open().unwrap();
        assert!(backend.close().unwrap());
        assert!(backend.fetch_atom(Handle::new(1)).is_err());
    }
}
