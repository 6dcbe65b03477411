//! Connection bootstrap and schema.

use std::path::Path;

use log::debug;
use rusqlite::Connection;

use crate::errors::StorageError;

/// Cache tables hold one JSON document per logical record; the pending log
/// keys on `(kind, key)` so the uniqueness invariant is enforced by the
/// database itself.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profile (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    date TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS pending_ops (
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (kind, key)
);
CREATE TABLE IF NOT EXISTS meta (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

pub(crate) fn open(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    debug!("opened practice store at {}", path.display());
    Ok(conn)
}

pub(crate) fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    // WAL with full synchronous keeps each committed transaction durable and
    // whole-record writes atomic across a crash.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
