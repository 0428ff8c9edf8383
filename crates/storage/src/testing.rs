//! Fixtures for the store tests.

use crate::KvEventStore;
use eventsourcing::{Aggregate, AggregateRoot, Event, EventPayload, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dog {
    #[serde(skip)]
    root: AggregateRoot,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Adopted {
    pub name: String,
}

impl EventPayload for Adopted {
    const REASON: &'static str = "Adopted";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Renamed {
    pub name: String,
}

impl EventPayload for Renamed {
    const REASON: &'static str = "Renamed";
}

/// Written by a newer version of the application; never registered here.
#[derive(Debug, Serialize, Deserialize)]
pub struct Unknown {
    pub note: String,
}

impl EventPayload for Unknown {
    const REASON: &'static str = "Unknown";
}

impl Dog {
    pub fn adopt(name: &str) -> Self {
        let mut dog = Self::default();
        dog.track_change(Adopted {
            name: name.to_string(),
        });
        dog
    }

    pub fn rename(&mut self, name: &str) {
        self.track_change(Renamed {
            name: name.to_string(),
        });
    }
}

impl Aggregate for Dog {
    const KIND: &'static str = "Dog";

    fn root(&self) -> &AggregateRoot {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot {
        &mut self.root
    }

    fn transition(&mut self, event: &Event) {
        if let Some(e) = event.data_as::<Adopted>() {
            self.name.clone_from(&e.name);
        } else if let Some(e) = event.data_as::<Renamed>() {
            self.name.clone_from(&e.name);
        }
    }

    fn register(registry: &mut Registry) {
        registry.register::<Self, Adopted>().register::<Self, Renamed>();
    }
}

pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.register_aggregate::<Dog>();
    Arc::new(registry)
}

pub fn store() -> KvEventStore {
    KvEventStore::in_memory(registry()).unwrap()
}
