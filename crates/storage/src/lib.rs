//! SQLite-backed event and snapshot storage.
//!
//! This crate is the embedded reference backend for the `eventsourcing`
//! contracts. It stores events in ordered, transactional key-value keyspaces
//! kept in a single SQLite table.
//!
//! # Layout
//!
//! - One keyspace per aggregate stream, named `{len}:{aggregate_type}_{id}`
//!   where `len` is the byte length of the type. Keys
//!   are the 8-byte big-endian event version, so key order is version order
//!   and a read can seek straight to `after_version + 1`.
//! - `global_event_order` holds every event under its 8-byte big-endian
//!   global version. Global versions come from one store-wide counter.
//! - `snapshots` holds the latest snapshot per aggregate.
//!
//! Values are serialized envelopes carrying the aggregate id and type, both
//! versions, the timestamp, the event reason, metadata and the payload.
//!
//! # Concurrency
//!
//! [`KvEventStore::save`](eventsourcing::EventStore::save) runs in one
//! immediate write transaction: it reads the stream's last version, rejects
//! the batch with [`eventsourcing::Error::Concurrency`] if it does not follow
//! on, allocates global versions and writes both keyspaces. Each iterator
//! owns a reader connection and reads inside a deferred transaction opened
//! on its first step and rolled back on close, so readers do not block one
//! another. With a file database in WAL mode they do not block writers
//! either; an in-memory store refuses saves while a reader is open.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eventsourcing::{Registry, Repository};
//! use storage::{KvEventStore, StoreConfig};
//!
//! let config = StoreConfig::load("store.toml")?;
//! let registry = Registry::new();
//! // registry.register_aggregate::<MyAggregate>();
//!
//! let store = KvEventStore::open(&config, Arc::new(registry))?;
//! let repository = Repository::new(store);
//! # Ok::<(), storage::Error>(())
//! ```

mod config;
mod error;
mod iterator;
mod kv;
mod record;
mod snapshot;
mod store;

#[cfg(test)]
mod testing;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use iterator::KvIterator;
pub use snapshot::KvSnapshotStore;
pub use store::KvEventStore;
