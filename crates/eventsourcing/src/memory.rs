//! In-memory stores, mainly for tests.

use crate::event::{Event, Version};
use crate::store::{EventIterator, EventStore, Snapshot, SnapshotStore, validate_events};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Streams {
    /// Keyed by `(aggregate type, aggregate id)`.
    streams: HashMap<(String, String), Vec<Event>>,
    global_version: Version,
}

/// Event store keeping every stream in a map.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<Streams>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All committed events across aggregates, in global order.
    pub fn global_events(&self) -> Vec<Event> {
        let inner = self.lock();
        let mut events: Vec<Event> = inner.streams.values().flatten().cloned().collect();
        events.sort_by_key(|e| e.global_version);
        events
    }
}

impl EventStore for MemoryEventStore {
    type Iter<'a> = MemoryIterator;

    fn save(&self, events: &mut [Event]) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let key = (first.aggregate_type.clone(), first.aggregate_id.clone());

        let mut inner = self.lock();
        let current = inner
            .streams
            .get(&key)
            .and_then(|s| s.last())
            .map_or(0, |e| e.version);
        validate_events(current, events)?;

        let mut global_version = inner.global_version;
        for event in events.iter_mut() {
            global_version += 1;
            event.global_version = global_version;
        }
        inner.global_version = global_version;
        inner
            .streams
            .entry(key)
            .or_default()
            .extend(events.iter().cloned());
        Ok(())
    }

    fn get(&self, id: &str, aggregate_type: &str, after_version: Version) -> Result<MemoryIterator> {
        let inner = self.lock();
        let stream = inner
            .streams
            .get(&(aggregate_type.to_string(), id.to_string()))
            .filter(|s| !s.is_empty())
            .ok_or(Error::NoEvents)?;

        let events: Vec<Event> = stream
            .iter()
            .filter(|e| e.version > after_version)
            .cloned()
            .collect();
        Ok(MemoryIterator {
            events: events.into_iter(),
            current: None,
        })
    }
}

/// Iterator over a copy of one stream.
#[derive(Debug)]
pub struct MemoryIterator {
    events: std::vec::IntoIter<Event>,
    current: Option<Event>,
}

impl EventIterator for MemoryIterator {
    fn next(&mut self) -> bool {
        self.current = self.events.next();
        self.current.is_some()
    }

    fn value(&mut self) -> Result<Event> {
        self.current.take().ok_or(Error::NoMoreEvents)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Snapshot store keeping the latest snapshot per aggregate.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<(String, String), Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.id.is_empty() {
            return Err(Error::EmptyAggregateId);
        }
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (snapshot.aggregate_type.clone(), snapshot.id.clone()),
                snapshot.clone(),
            );
        Ok(())
    }

    fn get(&self, id: &str, aggregate_type: &str) -> Result<Snapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(aggregate_type.to_string(), id.to_string()))
            .cloned()
            .ok_or(Error::SnapshotNotFound)
    }
}
