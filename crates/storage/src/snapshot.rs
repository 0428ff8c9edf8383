//! SQLite snapshot store.

use crate::kv::{self, SNAPSHOT_KEYSPACE};
use crate::store::connect;
use crate::{Result, StoreConfig};
use eventsourcing::{JsonSerializer, Serializer, Snapshot, SnapshotStore};
use rusqlite::Connection;
use std::sync::Arc;

/// Latest snapshot per aggregate, kept in the `snapshots` keyspace.
///
/// Independent of the event store; it may share the database file or use
/// its own.
pub struct KvSnapshotStore {
    conn: Connection,
    serializer: Arc<dyn Serializer>,
}

impl KvSnapshotStore {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            conn: connect(config)?,
            serializer: Arc::new(JsonSerializer),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::default())
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    fn key(id: &str, aggregate_type: &str) -> Vec<u8> {
        kv::stream_keyspace(aggregate_type, id).into_bytes()
    }

    fn put(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.id.is_empty() {
            return Err(eventsourcing::Error::EmptyAggregateId.into());
        }
        let value = self.serializer.marshal(&serde_json::to_value(snapshot)?)?;
        kv::upsert(
            &self.conn,
            SNAPSHOT_KEYSPACE,
            &Self::key(&snapshot.id, &snapshot.aggregate_type),
            &value,
        )?;
        Ok(())
    }

    fn fetch(&self, id: &str, aggregate_type: &str) -> Result<Snapshot> {
        let value = kv::get(&self.conn, SNAPSHOT_KEYSPACE, &Self::key(id, aggregate_type))?
            .ok_or(eventsourcing::Error::SnapshotNotFound)?;
        Ok(serde_json::from_value(self.serializer.unmarshal(&value)?)?)
    }
}

impl SnapshotStore for KvSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> eventsourcing::Result<()> {
        self.put(snapshot).map_err(Into::into)
    }

    fn get(&self, id: &str, aggregate_type: &str) -> eventsourcing::Result<Snapshot> {
        self.fetch(id, aggregate_type).map_err(Into::into)
    }
}
