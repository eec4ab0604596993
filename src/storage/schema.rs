//! SQLite schema and migrations for the atom snapshot store.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    // WAL lets readers proceed while a snapshot is being written
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;
    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

/// Apply version 1 schema.
fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    // One row per atom. `outgoing` is a JSON array of stored handles and
    // `rendered` the full textual form with the root truth value.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS atoms (
            handle INTEGER PRIMARY KEY,
            atom_type TEXT NOT NULL,
            name TEXT,
            outgoing TEXT,
            strength REAL NOT NULL,
            confidence REAL NOT NULL,
            sti INTEGER NOT NULL DEFAULT 0,
            lti INTEGER NOT NULL DEFAULT 0,
            vlti INTEGER NOT NULL DEFAULT 0,
            rendered TEXT NOT NULL,
            stored_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Snapshot log written by store_all
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            space_id TEXT NOT NULL,
            atom_count INTEGER NOT NULL,
            taken_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_atoms_type ON atoms(atom_type)",
        [],
    )?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_atoms_name ON atoms(name)", [])?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='atoms'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}
