//! Aggregate fixtures shared by the unit tests.

use crate::{Aggregate, AggregateRoot, Event, EventPayload, Registry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(skip)]
    root: AggregateRoot,
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Born {
    pub name: String,
}

impl EventPayload for Born {
    const REASON: &'static str = "Born";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgedOneYear;

impl EventPayload for AgedOneYear {
    const REASON: &'static str = "AgedOneYear";
}

/// Produced by a newer writer; never registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unknown {
    pub note: String,
}

impl EventPayload for Unknown {
    const REASON: &'static str = "Unknown";
}

impl Person {
    pub fn create(name: &str) -> Self {
        let mut person = Self::default();
        person.track_change(Born {
            name: name.to_string(),
        });
        person
    }

    pub fn with_root(root: AggregateRoot) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn grow_older(&mut self) {
        self.track_change(AgedOneYear);
    }
}

impl Aggregate for Person {
    const KIND: &'static str = "Person";

    fn root(&self) -> &AggregateRoot {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot {
        &mut self.root
    }

    fn transition(&mut self, event: &Event) {
        if let Some(born) = event.data_as::<Born>() {
            self.name.clone_from(&born.name);
            self.age = 0;
        } else if event.data_as::<AgedOneYear>().is_some() {
            self.age += 1;
        }
    }

    fn register(registry: &mut Registry) {
        registry
            .register::<Self, Born>()
            .register::<Self, AgedOneYear>();
    }
}
