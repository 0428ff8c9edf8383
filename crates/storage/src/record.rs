//! Persisted event envelope.

use chrono::{DateTime, Utc};
use eventsourcing::{Event, Metadata, Registry, Serializer, Version};
use serde::{Deserialize, Serialize};

use crate::Result;

/// An event as written to a keyspace.
///
/// The payload travels as its value tree; the reason selects the type it is
/// decoded into on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Record {
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: Version,
    pub global_version: Version,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub data: serde_json::Value,
}

impl Record {
    pub(crate) fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            aggregate_id: event.aggregate_id.clone(),
            aggregate_type: event.aggregate_type.clone(),
            version: event.version,
            global_version: event.global_version,
            timestamp: event.timestamp,
            reason: event.reason().to_string(),
            metadata: event.metadata.clone(),
            data: event.data.to_value()?,
        })
    }

    pub(crate) fn encode(&self, serializer: &dyn Serializer) -> Result<Vec<u8>> {
        Ok(serializer.marshal(&serde_json::to_value(self)?)?)
    }

    pub(crate) fn decode(bytes: &[u8], serializer: &dyn Serializer) -> Result<Self> {
        Ok(serde_json::from_value(serializer.unmarshal(bytes)?)?)
    }

    /// Rebuild the event, or `None` when its type is not registered.
    pub(crate) fn into_event(self, registry: &Registry) -> Result<Option<Event>> {
        let Some(data) = registry.decode(&self.aggregate_type, &self.reason, self.data)? else {
            return Ok(None);
        };
        Ok(Some(Event {
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            version: self.version,
            global_version: self.global_version,
            timestamp: self.timestamp,
            data,
            metadata: self.metadata,
        }))
    }
}

/// Decode raw keyspace bytes into an event.
pub(crate) fn decode_event(
    bytes: &[u8],
    serializer: &dyn Serializer,
    registry: &Registry,
) -> Result<Option<Event>> {
    let record = Record::decode(bytes, serializer)?;
    if !registry.is_registered(&record.aggregate_type, &record.reason) {
        tracing::trace!(
            aggregate_type = %record.aggregate_type,
            reason = %record.reason,
            version = record.version,
            "skipping unregistered event type"
        );
        return Ok(None);
    }
    record.into_event(registry)
}
