//! SQLite-backed snapshot store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use super::schema::{get_schema_version, initialize_schema, is_initialized};
use super::{PersistedAtom, StorageGateway};
use crate::atom::{AtomType, AttentionValue, Handle, TruthValue};
use crate::error::{Error, Result};
use crate::store::AtomSpace;

const BACKEND: &str = "sqlite";

const SELECT_COLUMNS: &str =
    "SELECT handle, atom_type, name, outgoing, strength, confidence, sti, lti, vlti FROM atoms";

/// SQLite-backed storage gateway.
pub struct SqliteBackend {
    /// `None` for an in-memory database.
    path: Option<PathBuf>,
    conn: Option<Arc<Mutex<Connection>>>,
}

/// One atoms-table row, encoded and ready to insert.
struct AtomRow {
    handle: i64,
    atom_type: String,
    name: Option<String>,
    outgoing: Option<String>,
    strength: f64,
    confidence: f64,
    sti: i32,
    lti: i32,
    vlti: bool,
    rendered: String,
}

impl AtomRow {
    fn encode(atom: &PersistedAtom) -> Result<Self> {
        let outgoing = if atom.is_link() {
            Some(serde_json::to_string(&atom.outgoing)?)
        } else {
            None
        };
        Ok(Self {
            handle: atom.handle.value() as i64,
            atom_type: atom.atom_type.to_string(),
            name: atom.name.clone(),
            outgoing,
            strength: atom.tv.strength,
            confidence: atom.tv.confidence,
            sti: atom.av.sti,
            lti: atom.av.lti,
            vlti: atom.av.vlti,
            rendered: atom.to_record(),
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO atoms (
                handle, atom_type, name, outgoing, strength, confidence,
                sti, lti, vlti, rendered, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.handle,
                self.atom_type,
                self.name,
                self.outgoing,
                self.strength,
                self.confidence,
                self.sti,
                self.lti,
                self.vlti,
                self.rendered,
                Utc::now().to_rfc3339(),
            ],
        )
    }
}

/// Columns of an atoms row before validation.
struct RawRow {
    handle: i64,
    atom_type: String,
    name: Option<String>,
    outgoing: Option<String>,
    tv: (f64, f64),
    av: AttentionValue,
}

impl RawRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            handle: row.get(0)?,
            atom_type: row.get(1)?,
            name: row.get(2)?,
            outgoing: row.get(3)?,
            tv: (row.get(4)?, row.get(5)?),
            av: AttentionValue::new(row.get(6)?, row.get(7)?, row.get(8)?),
        })
    }

    fn decode(self) -> Result<PersistedAtom> {
        let handle = Handle::new(self.handle as u64);
        let corrupt = |what: String| {
            Error::storage(BACKEND, format!("corrupt row for {}: {}", handle, what))
        };
        let tv = TruthValue::new(self.tv.0, self.tv.1).map_err(|e| corrupt(e.to_string()))?;
        let atom_type =
            AtomType::from_name(&self.atom_type).map_err(|e| corrupt(e.to_string()))?;
        let outgoing: Vec<Handle> = match (&self.name, self.outgoing) {
            (Some(_), None) => Vec::new(),
            (None, Some(json)) => {
                serde_json::from_str(&json).map_err(|e| corrupt(e.to_string()))?
            }
            _ => return Err(corrupt("expected exactly one of name and outgoing".to_string())),
        };
        Ok(PersistedAtom {
            handle,
            atom_type,
            name: self.name,
            outgoing,
            tv,
            av: self.av,
        })
    }
}

impl SqliteBackend {
    /// Backend for the database file at `path`. Call `open` to connect.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: None,
        }
    }

    /// Backend over a private in-memory database (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| Error::storage(BACKEND, "backend is not open"))?;
        let conn = conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&conn).map_err(|e| Error::storage(BACKEND, e.to_string()))
    }

    fn connect(&self) -> Result<Connection> {
        let conn = match &self.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| Error::storage(BACKEND, e.to_string()))?;

        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::storage(BACKEND, e.to_string()))?;
        }
        Ok(conn)
    }

    // ==================== Snapshot Operations ====================

    /// Number of snapshots written by `store_all` over the database's life.
    pub fn snapshot_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .map(|n| n as u64)
    }
}

impl StorageGateway for SqliteBackend {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn open(&mut self) -> Result<bool> {
        if self.conn.is_some() {
            return Ok(false);
        }
        let conn = self.connect()?;
        self.conn = Some(Arc::new(Mutex::new(conn)));
        debug!(path = ?self.path, "opened sqlite backend");
        Ok(true)
    }

    fn close(&mut self) -> Result<bool> {
        Ok(self.conn.take().is_some())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn store_atom(&mut self, atom: &PersistedAtom) -> Result<bool> {
        let row = AtomRow::encode(atom)?;
        self.with_conn(|conn| row.insert(conn))?;
        Ok(true)
    }

    fn fetch_atom(&self, handle: Handle) -> Result<Option<PersistedAtom>> {
        let raw = self.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE handle = ?1", SELECT_COLUMNS),
                params![handle.value() as i64],
                RawRow::read,
            )
            .optional()
        })?;
        raw.map(RawRow::decode).transpose()
    }

    fn remove_atom(&mut self, handle: Handle) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM atoms WHERE handle = ?1",
                params![handle.value() as i64],
            )?;
            Ok(rows > 0)
        })
    }

    fn fetch_all(&self) -> Result<Vec<PersistedAtom>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY handle", SELECT_COLUMNS))?;
            let rows = stmt.query_map([], RawRow::read)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        rows.into_iter().map(RawRow::decode).collect()
    }

    fn clear(&mut self) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM atoms", []).map(|_| ()))
    }

    fn stats(&self) -> Result<BTreeMap<String, u64>> {
        self.with_conn(|conn| {
            let atoms: i64 = conn.query_row("SELECT COUNT(*) FROM atoms", [], |row| row.get(0))?;
            let links: i64 = conn.query_row(
                "SELECT COUNT(*) FROM atoms WHERE outgoing IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            let snapshots: i64 =
                conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
            let version = get_schema_version(conn)?;
            Ok(BTreeMap::from([
                ("atoms".to_string(), atoms as u64),
                ("links".to_string(), links as u64),
                ("nodes".to_string(), (atoms - links) as u64),
                ("snapshots".to_string(), snapshots as u64),
                ("schema_version".to_string(), version as u64),
            ]))
        })
    }

    /// Replace the stored snapshot in a single transaction.
    #[instrument(skip_all, fields(space = %space.id()))]
    fn store_all(&mut self, space: &AtomSpace) -> Result<usize> {
        self.ensure_connected()?;
        let rows = space
            .handles()?
            .into_iter()
            .map(|h| AtomRow::encode(&PersistedAtom::capture(space, h)?))
            .collect::<Result<Vec<_>>>()?;
        let space_id = space.id().to_string();

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM atoms", [])?;
            for row in &rows {
                row.insert(&tx)?;
            }
            tx.execute(
                "INSERT INTO snapshots (space_id, atom_count, taken_at) VALUES (?1, ?2, ?3)",
                params![space_id, rows.len() as i64, Utc::now().to_rfc3339()],
            )?;
            tx.commit()
        })?;
        info!(count = rows.len(), "stored sqlite snapshot");
        Ok(rows.len())
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fingerprint, sample_space};
    use super::*;
    use crate::atom::AtomType;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_in_memory() -> SqliteBackend {
        let mut backend = SqliteBackend::in_memory();
        assert!(backend.open().unwrap());
        backend
    }

    #[test]
    fn test_round_trip_in_memory() {
        let source = sample_space();
        let mut backend = open_in_memory();
        assert_eq!(backend.store_all(&source).unwrap(), source.size());

        let target = AtomSpace::new();
        let remap = backend.load_all(&target).unwrap();
        assert_eq!(remap.len(), source.size());
        assert_eq!(fingerprint(&target), fingerprint(&source));

        let stats = backend.stats().unwrap();
        assert_eq!(stats["atoms"], 6);
        assert_eq!(stats["links"], 3);
        assert_eq!(stats["nodes"], 3);
        assert_eq!(stats["snapshots"], 1);
        assert_eq!(stats["schema_version"], 1);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("atoms.db");
        let source = sample_space();

        let mut writer = SqliteBackend::new(&path);
        writer.open().unwrap();
        writer.store_all(&source).unwrap();
        assert!(writer.close().unwrap());

        let mut reader = SqliteBackend::new(&path);
        reader.open().unwrap();
        let target = AtomSpace::new();
        reader.load_all(&target).unwrap();
        assert_eq!(fingerprint(&target), fingerprint(&source));
        assert_eq!(reader.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn test_fetch_single_atom() {
        let source = sample_space();
        let mut backend = open_in_memory();
        backend.store_all(&source).unwrap();

        let link = source
            .get_atoms_by_type(&AtomType::InheritanceLink, false)
            .unwrap()[0];
        let fetched = backend.fetch_atom(link).unwrap().unwrap();
        assert_eq!(fetched, PersistedAtom::capture(&source, link).unwrap());
        assert_eq!(fetched.outgoing, source.get_outgoing(link).unwrap());

        assert!(backend.remove_atom(link).unwrap());
        assert!(backend.fetch_atom(link).unwrap().is_none());
        assert!(backend.fetch_atom(Handle::new(999)).unwrap().is_none());
    }

    #[test]
    fn test_rendered_column_holds_flat_record() {
        let source = sample_space();
        let mut backend = open_in_memory();
        backend.store_all(&source).unwrap();

        let link = source
            .get_atoms_by_type(&AtomType::InheritanceLink, false)
            .unwrap()[0];
        let rendered: String = backend
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT rendered FROM atoms WHERE handle = ?1",
                    params![link.value() as i64],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(rendered, "(InheritanceLink #1 #2 (stv 1 0.1))");
    }

    #[test]
    fn test_store_all_replaces_previous_snapshot() {
        let mut backend = open_in_memory();
        backend.store_all(&sample_space()).unwrap();

        let small = AtomSpace::new();
        small.add_node(AtomType::ConceptNode, "only", None).unwrap();
        backend.store_all(&small).unwrap();

        assert_eq!(backend.fetch_all().unwrap().len(), 1);
        assert_eq!(backend.snapshot_count().unwrap(), 2);
    }

    #[test]
    fn test_closed_backend_errors() {
        let mut backend = SqliteBackend::in_memory();
        let err = backend.fetch_atom(Handle::new(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(backend.store_all(&sample_space()).is_err());
        assert!(!backend.close().unwrap());
    }

    #[test]
    fn test_unopenable_path_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::new(dir.path().join("missing").join("atoms.db"));
        let err = backend.open().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!backend.is_connected());
    }
}
