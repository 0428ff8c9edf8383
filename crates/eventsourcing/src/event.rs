//! Event types for the event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Per-aggregate and store-wide sequence number.
pub type Version = u64;

/// Free-form data attached to an event, outside the aggregate's state.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A payload type that can be carried by an [`Event`].
///
/// `REASON` is the event-kind tag. Together with the aggregate kind it
/// identifies the payload type in the [`Registry`](crate::Registry).
pub trait EventPayload: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    const REASON: &'static str;
}

/// Type-erased view of an [`EventPayload`].
pub trait Payload: Debug + Send + Sync {
    /// The event-kind tag.
    fn reason(&self) -> &'static str;

    /// Encode into the neutral value tree handed to a [`Serializer`](crate::Serializer).
    fn to_value(&self) -> serde_json::Result<serde_json::Value>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: EventPayload> Payload for T {
    fn reason(&self) -> &'static str {
        T::REASON
    }

    fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An immutable fact of state change.
///
/// `global_version` is zero until a store commits the event.
#[derive(Debug, Clone)]
pub struct Event {
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: Version,
    pub global_version: Version,
    pub timestamp: DateTime<Utc>,
    pub data: Arc<dyn Payload>,
    pub metadata: Option<Metadata>,
}

impl Event {
    /// The event-kind tag of the payload.
    pub fn reason(&self) -> &'static str {
        self.data.reason()
    }

    /// Borrow the payload as a concrete type, if it is one.
    pub fn data_as<T: EventPayload>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }

    /// Look up a metadata entry.
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.as_ref()?.get(key)
    }
}
