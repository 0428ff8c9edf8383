//! Payload serialization and the event type registry.

use crate::aggregate::Aggregate;
use crate::event::{EventPayload, Payload};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Marshals the neutral value tree to bytes and back.
///
/// Stores keep their wire format behind this trait so the aggregate and
/// payload code never depends on it.
pub trait Serializer: Send + Sync {
    fn marshal(&self, value: &serde_json::Value) -> Result<Vec<u8>>;

    fn unmarshal(&self, data: &[u8]) -> Result<serde_json::Value>;
}

/// JSON wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn marshal(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal(&self, data: &[u8]) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Builds a payload instance from its decoded value tree.
pub type Factory = fn(serde_json::Value) -> serde_json::Result<Arc<dyn Payload>>;

fn decode<T: EventPayload>(value: serde_json::Value) -> serde_json::Result<Arc<dyn Payload>> {
    let payload: T = serde_json::from_value(value)?;
    Ok(Arc::new(payload))
}

/// Maps `(aggregate type, reason)` to the factory for that payload type.
///
/// Event types missing from the registry are skipped when reading a stream,
/// so older readers tolerate events added by newer writers.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    types: HashMap<(String, String), Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register payload `T` as an event of aggregate kind `A`.
    pub fn register<A: Aggregate, T: EventPayload>(&mut self) -> &mut Self {
        self.types
            .insert((A::KIND.to_string(), T::REASON.to_string()), decode::<T>);
        self
    }

    /// Register every event type the aggregate declares.
    pub fn register_aggregate<A: Aggregate>(&mut self) -> &mut Self {
        A::register(self);
        self
    }

    pub fn factory(&self, aggregate_type: &str, reason: &str) -> Option<Factory> {
        self.types
            .get(&(aggregate_type.to_string(), reason.to_string()))
            .copied()
    }

    pub fn is_registered(&self, aggregate_type: &str, reason: &str) -> bool {
        self.factory(aggregate_type, reason).is_some()
    }

    /// Reconstruct a payload.
    ///
    /// Returns `Ok(None)` for an unregistered type and
    /// [`Error::Deserialize`] when a registered type does not fit the data.
    pub fn decode(
        &self,
        aggregate_type: &str,
        reason: &str,
        value: serde_json::Value,
    ) -> Result<Option<Arc<dyn Payload>>> {
        let Some(factory) = self.factory(aggregate_type, reason) else {
            return Ok(None);
        };
        factory(value)
            .map(Some)
            .map_err(|source| Error::Deserialize {
                aggregate_type: aggregate_type.to_string(),
                reason: reason.to_string(),
                source,
            })
    }
}
