//! Loading and saving aggregates through the store contracts.

use crate::aggregate::Aggregate;
use crate::serializer::{JsonSerializer, Serializer};
use crate::store::{EventStore, Snapshot, SnapshotStore, collect_events};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Commits aggregate changes and rebuilds aggregates from their events.
pub struct Repository<E> {
    events: E,
}

impl<E: EventStore> Repository<E> {
    pub fn new(events: E) -> Self {
        Self { events }
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    /// Commit the aggregate's unsaved events.
    ///
    /// On failure the events stay buffered; after a
    /// [`Error::Concurrency`] the caller reloads and retries.
    pub fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<()> {
        if !aggregate.root().unsaved_events() {
            return Ok(());
        }

        let mut events = aggregate.root().events();
        if let Err(e) = self.events.save(&mut events) {
            if matches!(e, Error::Concurrency) {
                tracing::warn!(
                    aggregate_id = aggregate.root().id(),
                    aggregate_type = A::KIND,
                    version = aggregate.root().version(),
                    "concurrent modification, save rejected"
                );
            }
            return Err(e);
        }
        aggregate.root_mut().update(&events);

        tracing::debug!(
            aggregate_id = aggregate.root().id(),
            aggregate_type = A::KIND,
            event_count = events.len(),
            global_version = aggregate.root().global_version(),
            "saved aggregate events"
        );
        Ok(())
    }

    /// Rebuild an aggregate from its full history.
    pub fn get<A: Aggregate + Default>(&self, id: &str) -> Result<A> {
        let mut aggregate = A::default();
        self.get_into(&mut aggregate, id)?;
        Ok(aggregate)
    }

    /// Replay the aggregate's history onto `aggregate`.
    pub fn get_into<A: Aggregate>(&self, aggregate: &mut A, id: &str) -> Result<()> {
        self.replay(aggregate, id, 0)
    }

    fn replay<A: Aggregate>(&self, aggregate: &mut A, id: &str, after_version: u64) -> Result<()> {
        let iter = self.events.get(id, A::KIND, after_version)?;
        let events = collect_events(iter)?;
        aggregate.build_from_history(events);
        Ok(())
    }
}

/// Repository that shortcuts replay with stored snapshots.
pub struct SnapshotRepository<E, S> {
    repository: Repository<E>,
    snapshots: S,
    serializer: Arc<dyn Serializer>,
}

impl<E: EventStore, S: SnapshotStore> SnapshotRepository<E, S> {
    pub fn new(repository: Repository<E>, snapshots: S) -> Self {
        Self {
            repository,
            snapshots,
            serializer: Arc::new(JsonSerializer),
        }
    }

    /// Use a different wire format for snapshot state.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn repository(&self) -> &Repository<E> {
        &self.repository
    }

    pub fn snapshot_store(&self) -> &S {
        &self.snapshots
    }

    pub fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<()> {
        self.repository.save(aggregate)
    }

    /// Store the aggregate's current state.
    ///
    /// Only persisted state can be snapshotted.
    pub fn save_snapshot<A: Aggregate + Serialize>(&self, aggregate: &A) -> Result<()> {
        let root = aggregate.root();
        if root.unsaved_events() {
            return Err(Error::UnsavedEvents);
        }
        let state = self.serializer.marshal(&serde_json::to_value(aggregate)?)?;
        let snapshot = Snapshot {
            id: root.id().to_string(),
            aggregate_type: A::KIND.to_string(),
            version: root.version(),
            global_version: root.global_version(),
            state,
        };
        self.snapshots.save(&snapshot)?;

        tracing::debug!(
            aggregate_id = root.id(),
            aggregate_type = A::KIND,
            version = snapshot.version,
            "saved snapshot"
        );
        Ok(())
    }

    /// Load from the latest snapshot plus the events recorded after it.
    ///
    /// Falls back to a full replay when there is no snapshot.
    pub fn get<A: Aggregate + Default + DeserializeOwned>(&self, id: &str) -> Result<A> {
        let snapshot = match self.snapshots.get(id, A::KIND) {
            Ok(snapshot) => snapshot,
            Err(Error::SnapshotNotFound) => return self.repository.get(id),
            Err(e) => return Err(e),
        };

        let value = self.serializer.unmarshal(&snapshot.state)?;
        let mut aggregate: A = serde_json::from_value(value)?;
        aggregate
            .root_mut()
            .set_internals(&snapshot.id, snapshot.version, snapshot.global_version);

        match self.repository.replay(&mut aggregate, id, snapshot.version) {
            // A snapshot is only taken of an existing aggregate.
            Ok(()) | Err(Error::NoEvents) => Ok(aggregate),
            Err(e) => Err(e),
        }
    }
}
