//! Aggregate root: identity, versions and the unsaved-event buffer.

use crate::event::{Event, EventPayload, Metadata, Version};
use crate::serializer::Registry;
use crate::{Error, Result};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Strategy used to assign an id to an aggregate on its first change.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

fn uuid_generator() -> IdGenerator {
    Arc::new(|| Uuid::new_v4().to_string())
}

/// State every aggregate embeds.
///
/// Not synchronized: an aggregate belongs to one unit of work at a time.
#[derive(Clone)]
pub struct AggregateRoot {
    id: String,
    version: Version,
    global_version: Version,
    events: Vec<Event>,
    id_generator: IdGenerator,
}

impl Default for AggregateRoot {
    fn default() -> Self {
        Self::with_id_generator(uuid_generator())
    }
}

impl fmt::Debug for AggregateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("global_version", &self.global_version)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl AggregateRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root that asks `id_generator` for its id when first changed.
    pub fn with_id_generator(id_generator: IdGenerator) -> Self {
        Self {
            id: String::new(),
            version: 0,
            global_version: 0,
            events: Vec::new(),
            id_generator,
        }
    }

    /// Assign the aggregate id from the outside.
    ///
    /// Fails with [`Error::AlreadyExists`] if the id is already set.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        if !self.id.is_empty() {
            return Err(Error::AlreadyExists);
        }
        self.id = id.into();
        Ok(())
    }

    /// The aggregate id, empty until assigned.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version of the last event, including unsaved ones.
    pub fn version(&self) -> Version {
        self.events.last().map_or(self.version, |e| e.version)
    }

    /// Global version of the last persisted event.
    pub fn global_version(&self) -> Version {
        self.global_version
    }

    /// Copy of the unsaved events.
    pub fn events(&self) -> Vec<Event> {
        self.events.clone()
    }

    pub fn unsaved_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn track(
        &mut self,
        aggregate_type: &str,
        data: impl EventPayload,
        metadata: Option<Metadata>,
    ) -> Event {
        if self.id.is_empty() {
            self.id = (self.id_generator)();
        }
        let event = Event {
            aggregate_id: self.id.clone(),
            aggregate_type: aggregate_type.to_string(),
            version: self.version() + 1,
            global_version: 0,
            timestamp: Utc::now(),
            data: Arc::new(data),
            metadata,
        };
        self.events.push(event.clone());
        event
    }

    fn replayed(&mut self, event: &Event) {
        self.id.clone_from(&event.aggregate_id);
        self.version = event.version;
        self.global_version = event.global_version;
    }

    /// Mark the buffered events as persisted.
    ///
    /// `committed` is the batch as returned from the store, carrying the
    /// global versions it assigned.
    pub(crate) fn update(&mut self, committed: &[Event]) {
        for (buffered, saved) in self.events.iter_mut().zip(committed) {
            buffered.global_version = saved.global_version;
        }
        if let Some(last) = self.events.last() {
            self.version = last.version;
            self.global_version = last.global_version;
            self.events.clear();
        }
    }

    pub(crate) fn set_internals(&mut self, id: &str, version: Version, global_version: Version) {
        self.id = id.to_string();
        self.version = version;
        self.global_version = global_version;
        self.events.clear();
    }
}

/// An event-sourced entity.
///
/// Implementors embed an [`AggregateRoot`] and fold events into their state
/// in [`transition`](Aggregate::transition).
pub trait Aggregate {
    /// Kind tag used for registry dispatch and persistence.
    const KIND: &'static str;

    fn root(&self) -> &AggregateRoot;

    fn root_mut(&mut self) -> &mut AggregateRoot;

    /// Apply one event to the aggregate's state.
    fn transition(&mut self, event: &Event);

    /// Register the event payloads this aggregate produces.
    fn register(registry: &mut Registry);

    /// Record a change and apply it immediately.
    fn track_change<T: EventPayload>(&mut self, data: T) {
        self.track_change_with_metadata(data, None);
    }

    /// Record a change carrying metadata and apply it immediately.
    fn track_change_with_metadata<T: EventPayload>(&mut self, data: T, metadata: Option<Metadata>) {
        let event = self.root_mut().track(Self::KIND, data, metadata);
        self.transition(&event);
    }

    /// Rebuild state from stored events in ascending version order.
    fn build_from_history<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.transition(&event);
            self.root_mut().replayed(&event);
        }
    }
}
