//! SQLite event store implementation.

use crate::iterator::KvIterator;
use crate::kv::{self, Cursor, GLOBAL_KEYSPACE};
use crate::record::{Record, decode_event};
use crate::{Result, StoreConfig};
use eventsourcing::{Event, EventStore, JsonSerializer, Registry, Serializer, Version, validate_events};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Open a connection as described by `config` and create the schema.
pub(crate) fn connect(config: &StoreConfig) -> Result<Connection> {
    let conn = match &config.path {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    prepare(&conn, config)?;
    Ok(conn)
}

fn prepare(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    if config.wal && config.path.is_some() {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    }
    conn.execute_batch(kv::SCHEMA)?;
    Ok(())
}

/// Event store over ordered SQLite keyspaces.
///
/// Each aggregate stream lives in its own keyspace keyed by big-endian
/// version. Every event is also written to a store-wide keyspace keyed by
/// its global version, which is allocated from a single counter.
///
/// Writes go through the store's own connection. Every [`KvIterator`] opens
/// a separate connection to the same database, so any number of iterators
/// may be open at once. An in-memory store is a named shared-cache database;
/// there an open iterator blocks saves until it is closed.
pub struct KvEventStore {
    conn: Connection,
    location: PathBuf,
    busy_timeout: Duration,
    registry: Arc<Registry>,
    serializer: Arc<dyn Serializer>,
}

impl KvEventStore {
    /// Open or create an event store as configured.
    pub fn open(config: &StoreConfig, registry: Arc<Registry>) -> Result<Self> {
        let location = match &config.path {
            Some(path) => path.clone(),
            None => PathBuf::from(format!("file:events-{}?mode=memory&cache=shared", Uuid::new_v4())),
        };
        let conn = Connection::open(&location)?;
        prepare(&conn, config)?;
        tracing::debug!(path = ?config.path, "opened event store");
        Ok(Self {
            conn,
            location,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            registry,
            serializer: Arc::new(JsonSerializer),
        })
    }

    /// Open or create an event store at the given path.
    pub fn open_path(path: impl AsRef<Path>, registry: Arc<Registry>) -> Result<Self> {
        Self::open(&StoreConfig::file(path.as_ref()), registry)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory(registry: Arc<Registry>) -> Result<Self> {
        Self::open(&StoreConfig::default(), registry)
    }

    /// Use a different wire format for records.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A fresh connection for one reader.
    pub(crate) fn reader(&self) -> Result<Connection> {
        let conn = Connection::open(&self.location)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn save_events(&self, events: &mut [Event]) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let keyspace = kv::stream_keyspace(&first.aggregate_type, &first.aggregate_id);

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let current = kv::last_counter(&tx, &keyspace)?;
        if let Err(e) = validate_events(current, events) {
            if matches!(e, eventsourcing::Error::Concurrency) {
                tracing::warn!(%keyspace, current, first = events[0].version, "version conflict");
            }
            return Err(e.into());
        }

        let mut global_version = kv::last_counter(&tx, GLOBAL_KEYSPACE)?;
        let mut assigned = Vec::with_capacity(events.len());
        for event in events.iter() {
            global_version += 1;
            let mut record = Record::from_event(event)?;
            record.global_version = global_version;
            let value = record.encode(self.serializer.as_ref())?;

            kv::insert(&tx, &keyspace, &kv::encode_key(event.version), &value)?;
            kv::insert(&tx, GLOBAL_KEYSPACE, &kv::encode_key(global_version), &value)?;
            assigned.push(global_version);
        }
        tx.commit()?;

        for (event, global_version) in events.iter_mut().zip(assigned) {
            event.global_version = global_version;
        }
        tracing::debug!(%keyspace, event_count = events.len(), global_version, "committed events");
        Ok(())
    }

    fn open_stream(&self, id: &str, aggregate_type: &str, after_version: Version) -> Result<KvIterator> {
        let keyspace = kv::stream_keyspace(aggregate_type, id);
        if kv::last_counter(&self.conn, &keyspace)? == 0 {
            return Err(eventsourcing::Error::NoEvents.into());
        }
        Ok(KvIterator::new(
            self.reader()?,
            keyspace,
            after_version,
            self.registry.clone(),
            self.serializer.clone(),
        ))
    }

    /// Read up to `count` events in global order, starting at global
    /// version `start`.
    ///
    /// Events of unregistered types are skipped and do not count.
    pub fn global_events(&self, start: Version, count: usize) -> eventsourcing::Result<Vec<Event>> {
        self.read_global(start, count).map_err(Into::into)
    }

    fn read_global(&self, start: Version, count: usize) -> Result<Vec<Event>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        let mut cursor = Cursor::new(GLOBAL_KEYSPACE);
        let mut events = Vec::new();

        let mut entry = cursor.seek(&tx, &kv::encode_key(start))?;
        while events.len() < count {
            let Some((_, value)) = entry else {
                break;
            };
            if let Some(event) = decode_event(&value, self.serializer.as_ref(), &self.registry)? {
                events.push(event);
            }
            entry = cursor.next(&tx)?;
        }
        tx.rollback()?;
        Ok(events)
    }
}

impl EventStore for KvEventStore {
    type Iter<'a> = KvIterator;

    fn save(&self, events: &mut [Event]) -> eventsourcing::Result<()> {
        self.save_events(events).map_err(Into::into)
    }

    fn get(&self, id: &str, aggregate_type: &str, after_version: Version) -> eventsourcing::Result<KvIterator> {
        self.open_stream(id, aggregate_type, after_version)
            .map_err(Into::into)
    }
}
