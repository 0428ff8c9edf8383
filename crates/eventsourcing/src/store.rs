//! Persistence contracts implemented by every backend.

use crate::event::{Event, Version};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Append-only store of aggregate event streams.
pub trait EventStore {
    type Iter<'a>: EventIterator
    where
        Self: 'a;

    /// Atomically commit a batch of events for one aggregate.
    ///
    /// The store assigns `global_version` on each event in place. Fails with
    /// [`Error::Concurrency`] when the stored version is not the predecessor
    /// of the batch's first event, leaving stored state untouched.
    fn save(&self, events: &mut [Event]) -> Result<()>;

    /// Open a stream over the events with `version > after_version`.
    ///
    /// Fails with [`Error::NoEvents`] when the aggregate has no events.
    fn get(&self, id: &str, aggregate_type: &str, after_version: Version) -> Result<Self::Iter<'_>>;
}

/// Pull-based reader over an event stream.
///
/// Always finish with [`close`](EventIterator::close); dropping the iterator
/// also releases its resources but cannot report a failure to do so.
pub trait EventIterator {
    /// Advance; `false` once the stream is exhausted.
    fn next(&mut self) -> bool;

    /// Take the event the iterator is positioned on.
    ///
    /// Read and decode failures for that position are reported here.
    fn value(&mut self) -> Result<Event>;

    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Aggregate state materialized at a known version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub aggregate_type: String,
    pub version: Version,
    pub global_version: Version,
    pub state: Vec<u8>,
}

/// Optional store holding the latest snapshot per aggregate.
pub trait SnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Fails with [`Error::SnapshotNotFound`] when there is none.
    fn get(&self, id: &str, aggregate_type: &str) -> Result<Snapshot>;
}

/// Check a batch against the version currently stored for its aggregate.
///
/// An empty batch passes. Otherwise each event is checked in order: an
/// empty aggregate id fails with [`Error::EmptyAggregateId`] wherever it
/// appears, an id or type differing from the first event's fails with
/// [`Error::InvalidBatch`], and a version that does not follow on from
/// `current` and its predecessor fails with [`Error::Concurrency`].
///
/// Backends call this inside their write transaction.
pub fn validate_events(current: Version, events: &[Event]) -> Result<()> {
    let Some(first) = events.first() else {
        return Ok(());
    };

    let mut expected = current;
    for event in events {
        if event.aggregate_id.is_empty() {
            return Err(Error::EmptyAggregateId);
        }
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type {
            return Err(Error::InvalidBatch(format!(
                "batch mixes {}/{} with {}/{}",
                first.aggregate_type, first.aggregate_id, event.aggregate_type, event.aggregate_id
            )));
        }
        expected += 1;
        if event.version != expected {
            return Err(Error::Concurrency);
        }
    }
    Ok(())
}

/// Drain an iterator into a vector, closing it on every path.
pub fn collect_events<I: EventIterator>(mut iter: I) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    while iter.next() {
        match iter.value() {
            Ok(event) => events.push(event),
            Err(e) => {
                if let Err(close_err) = iter.close() {
                    tracing::warn!(error = %close_err, "failed to close iterator after read error");
                }
                return Err(e);
            }
        }
    }
    iter.close()?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AgedOneYear, Born};
    use chrono::Utc;
    use std::sync::Arc;

    fn event(id: &str, aggregate_type: &str, version: Version) -> Event {
        Event {
            aggregate_id: id.to_string(),
            aggregate_type: aggregate_type.to_string(),
            version,
            global_version: 0,
            timestamp: Utc::now(),
            data: if version == 1 {
                Arc::new(Born {
                    name: "Kalle".to_string(),
                })
            } else {
                Arc::new(AgedOneYear)
            },
            metadata: None,
        }
    }

    #[test]
    fn test_validate_contiguous_batch() {
        let batch = vec![event("a", "Person", 3), event("a", "Person", 4)];
        assert!(validate_events(2, &batch).is_ok());
        assert!(validate_events(0, &[]).is_ok());
    }

    #[test]
    fn test_validate_stale_predecessor() {
        let batch = vec![event("a", "Person", 3)];
        assert!(matches!(validate_events(3, &batch), Err(Error::Concurrency)));
        assert!(matches!(validate_events(1, &batch), Err(Error::Concurrency)));
    }

    #[test]
    fn test_validate_gap_in_batch() {
        let batch = vec![event("a", "Person", 1), event("a", "Person", 3)];
        assert!(matches!(validate_events(0, &batch), Err(Error::Concurrency)));
    }

    #[test]
    fn test_validate_mixed_aggregates() {
        let batch = vec![event("a", "Person", 1), event("b", "Person", 2)];
        assert!(matches!(validate_events(0, &batch), Err(Error::InvalidBatch(_))));

        let batch = vec![event("a", "Person", 1), event("a", "Dog", 2)];
        assert!(matches!(validate_events(0, &batch), Err(Error::InvalidBatch(_))));
    }

    #[test]
    fn test_validate_empty_id() {
        let batch = vec![event("", "Person", 1)];
        assert!(matches!(validate_events(0, &batch), Err(Error::EmptyAggregateId)));

        let batch = vec![event("a", "Person", 1), event("", "Person", 2)];
        assert!(matches!(validate_events(0, &batch), Err(Error::EmptyAggregateId)));
    }
}
