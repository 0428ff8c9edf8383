//! Ordered key-value keyspaces on top of a single SQLite table.
//!
//! Keys are compared bytewise, so fixed-width big-endian integers sort in
//! numeric order and a stream can be scanned from any version onwards.

use rusqlite::{Connection, OptionalExtension, params};

pub(crate) const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS kv (
        keyspace TEXT NOT NULL,
        key BLOB NOT NULL,
        value BLOB NOT NULL,
        PRIMARY KEY (keyspace, key)
    ) WITHOUT ROWID;
"#;

/// Keyspace holding every event under its global version.
pub(crate) const GLOBAL_KEYSPACE: &str = "global_event_order";

/// Keyspace holding the latest snapshot per aggregate.
pub(crate) const SNAPSHOT_KEYSPACE: &str = "snapshots";

pub(crate) type Entry = (Vec<u8>, Vec<u8>);

pub(crate) fn encode_key(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

pub(crate) fn decode_key(key: &[u8]) -> Option<u64> {
    key.try_into().ok().map(u64::from_be_bytes)
}

/// Keyspace name of one aggregate's event stream.
///
/// The type is length-prefixed so no (type, id) pair can spell another's name.
pub(crate) fn stream_keyspace(aggregate_type: &str, id: &str) -> String {
    format!("{}:{aggregate_type}_{id}", aggregate_type.len())
}

/// Insert a new entry; fails if the key is taken.
pub(crate) fn insert(conn: &Connection, keyspace: &str, key: &[u8], value: &[u8]) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO kv (keyspace, key, value) VALUES (?1, ?2, ?3)",
        params![keyspace, key, value],
    )?;
    Ok(())
}

pub(crate) fn upsert(conn: &Connection, keyspace: &str, key: &[u8], value: &[u8]) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO kv (keyspace, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (keyspace, key) DO UPDATE SET value = excluded.value",
        params![keyspace, key, value],
    )?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, keyspace: &str, key: &[u8]) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM kv WHERE keyspace = ?1 AND key = ?2",
        params![keyspace, key],
        |row| row.get(0),
    )
    .optional()
}

/// Highest entry in the keyspace.
pub(crate) fn last(conn: &Connection, keyspace: &str) -> rusqlite::Result<Option<Entry>> {
    conn.query_row(
        "SELECT key, value FROM kv WHERE keyspace = ?1 ORDER BY key DESC LIMIT 1",
        params![keyspace],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Last key of a keyspace of big-endian counters, 0 when empty.
pub(crate) fn last_counter(conn: &Connection, keyspace: &str) -> rusqlite::Result<u64> {
    Ok(last(conn, keyspace)?
        .and_then(|(key, _)| decode_key(&key))
        .unwrap_or(0))
}

/// First entry with a key `>= key`.
fn seek(conn: &Connection, keyspace: &str, key: &[u8]) -> rusqlite::Result<Option<Entry>> {
    conn.query_row(
        "SELECT key, value FROM kv WHERE keyspace = ?1 AND key >= ?2 ORDER BY key LIMIT 1",
        params![keyspace, key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// First entry with a key `> key`.
fn after(conn: &Connection, keyspace: &str, key: &[u8]) -> rusqlite::Result<Option<Entry>> {
    conn.query_row(
        "SELECT key, value FROM kv WHERE keyspace = ?1 AND key > ?2 ORDER BY key LIMIT 1",
        params![keyspace, key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Forward cursor over one keyspace.
///
/// Holds no statement between steps; run it inside a transaction to get a
/// consistent view.
#[derive(Debug)]
pub(crate) struct Cursor {
    keyspace: String,
    position: Option<Vec<u8>>,
}

impl Cursor {
    pub(crate) fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            position: None,
        }
    }

    /// Position on the first entry with a key `>= key`.
    pub(crate) fn seek(&mut self, conn: &Connection, key: &[u8]) -> rusqlite::Result<Option<Entry>> {
        let entry = seek(conn, &self.keyspace, key)?;
        self.track(entry)
    }

    /// Step to the entry after the current one, or seek from the start.
    pub(crate) fn next(&mut self, conn: &Connection) -> rusqlite::Result<Option<Entry>> {
        let entry = match &self.position {
            Some(position) => after(conn, &self.keyspace, position)?,
            None => seek(conn, &self.keyspace, &[])?,
        };
        self.track(entry)
    }

    fn track(&mut self, entry: Option<Entry>) -> rusqlite::Result<Option<Entry>> {
        if let Some((key, _)) = &entry {
            self.position = Some(key.clone());
        }
        Ok(entry)
    }
}
