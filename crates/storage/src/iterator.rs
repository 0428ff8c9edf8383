//! Stream iterator over one aggregate keyspace.

use crate::kv::{self, Cursor};
use crate::record::decode_event;
use crate::{Error, Result};
use eventsourcing::{Event, EventIterator, Registry, Serializer, Version};
use rusqlite::Connection;
use std::sync::Arc;

/// Reads one aggregate's events in version order.
///
/// Owns a reader connection of its own. The read transaction is opened on
/// the first [`next`](EventIterator::next) and held until
/// [`close`](EventIterator::close) or drop. A read error ends the iteration:
/// it is reported once through [`value`](EventIterator::value) and every
/// later `next` returns `false`.
pub struct KvIterator {
    conn: Connection,
    reading: bool,
    cursor: Cursor,
    after_version: Version,
    exhausted: bool,
    registry: Arc<Registry>,
    serializer: Arc<dyn Serializer>,
    current: Option<eventsourcing::Result<Event>>,
}

impl KvIterator {
    pub(crate) fn new(
        conn: Connection,
        keyspace: String,
        after_version: Version,
        registry: Arc<Registry>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            conn,
            reading: false,
            cursor: Cursor::new(keyspace),
            after_version,
            exhausted: false,
            registry,
            serializer,
            current: None,
        }
    }

    /// Next registered event, or [`eventsourcing::Error::NoMoreEvents`].
    fn advance(&mut self) -> Result<Event> {
        loop {
            if self.exhausted {
                return Err(eventsourcing::Error::NoMoreEvents.into());
            }

            let entry = if self.reading {
                self.cursor.next(&self.conn)?
            } else {
                self.conn.execute_batch("BEGIN DEFERRED")?;
                self.reading = true;
                match self.after_version.checked_add(1) {
                    Some(first) => self.cursor.seek(&self.conn, &kv::encode_key(first))?,
                    None => None,
                }
            };

            let Some((_, value)) = entry else {
                self.exhausted = true;
                continue;
            };
            if let Some(event) = decode_event(&value, self.serializer.as_ref(), &self.registry)? {
                return Ok(event);
            }
        }
    }

    /// Roll back the read transaction if one is open.
    fn finish(&mut self) -> rusqlite::Result<()> {
        if std::mem::take(&mut self.reading) {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl EventIterator for KvIterator {
    fn next(&mut self) -> bool {
        match self.advance() {
            Ok(event) => {
                self.current = Some(Ok(event));
                true
            }
            Err(Error::Store(eventsourcing::Error::NoMoreEvents)) => {
                self.current = None;
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "stream read failed");
                self.exhausted = true;
                self.current = Some(Err(e.into()));
                true
            }
        }
    }

    fn value(&mut self) -> eventsourcing::Result<Event> {
        self.current
            .take()
            .unwrap_or(Err(eventsourcing::Error::NoMoreEvents))
    }

    fn close(mut self) -> eventsourcing::Result<()> {
        self.finish().map_err(eventsourcing::Error::backend)
    }
}

impl Drop for KvIterator {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "failed to roll back iterator read transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::KvEventStore;
    use crate::kv;
    use crate::testing::{Dog, registry, store};
    use eventsourcing::{Aggregate, EventIterator, EventStore, collect_events};

    fn corrupt(store: &KvEventStore, dog: &Dog, version: u64) {
        let keyspace = kv::stream_keyspace(Dog::KIND, dog.root().id());
        let conn = store.reader().unwrap();
        let bytes = kv::get(&conn, &keyspace, &kv::encode_key(version)).unwrap().unwrap();
        let mut record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        record["data"] = serde_json::json!({ "name": 7 });
        kv::upsert(&conn, &keyspace, &kv::encode_key(version), &serde_json::to_vec(&record).unwrap()).unwrap();
    }

    #[test]
    fn test_iterates_in_version_order() {
        let store = store();
        let mut dog = Dog::adopt("Bamse");
        for name in ["a", "b", "c", "d"] {
            dog.rename(name);
        }
        store.save(&mut dog.root().events()).unwrap();

        let mut iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
        let mut last = 0;
        while iter.next() {
            let event = iter.value().unwrap();
            assert!(event.version > last);
            last = event.version;
        }
        assert_eq!(last, 5);
        assert!(!iter.next());
        iter.close().unwrap();
    }

    #[test]
    fn test_close_mid_scan_releases_transaction() {
        let store = store();
        let mut dog = Dog::adopt("Bamse");
        dog.rename("Rex");
        store.save(&mut dog.root().events()).unwrap();

        let mut iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
        assert!(iter.next());
        assert_eq!(iter.value().unwrap().version, 1);
        iter.close().unwrap();

        dog.rename("Fido");
        store.save(&mut dog.root().events()[2..].to_vec()).unwrap();
        assert_eq!(store.global_events(1, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_drop_mid_scan_releases_transaction() {
        let store = store();
        let dog = Dog::adopt("Bamse");
        store.save(&mut dog.root().events()).unwrap();

        {
            let mut iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
            assert!(iter.next());
        }

        let mut more = Dog::default();
        more.root_mut().set_id(dog.root().id()).unwrap();
        more.rename("placeholder");
        let mut events = more.root().events();
        events[0].version = 2;
        store.save(&mut events).unwrap();
    }

    #[test]
    fn test_close_unopened_iterator() {
        let store = store();
        let dog = Dog::adopt("Bamse");
        store.save(&mut dog.root().events()).unwrap();

        let iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
        iter.close().unwrap();
    }

    #[test]
    fn test_after_max_version_is_empty() {
        let store = store();
        let dog = Dog::adopt("Bamse");
        store.save(&mut dog.root().events()).unwrap();

        let mut iter = store.get(dog.root().id(), Dog::KIND, u64::MAX).unwrap();
        assert!(!iter.next());
        assert!(iter.value().is_err());
        iter.close().unwrap();
    }

    #[test]
    fn test_read_error_ends_iteration() {
        let store = store();
        let mut dog = Dog::adopt("Bamse");
        dog.rename("Rex");
        store.save(&mut dog.root().events()).unwrap();
        corrupt(&store, &dog, 1);

        let mut iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
        assert!(iter.next());
        assert!(matches!(
            iter.value(),
            Err(eventsourcing::Error::Deserialize { .. })
        ));
        assert!(!iter.next());
        assert!(matches!(iter.value(), Err(eventsourcing::Error::NoMoreEvents)));
        iter.close().unwrap();

        assert!(collect_events(store.get(dog.root().id(), Dog::KIND, 0).unwrap()).is_err());
        let tail = collect_events(store.get(dog.root().id(), Dog::KIND, 1).unwrap()).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].version, 2);
    }

    #[test]
    fn test_concurrent_readers() {
        let store = store();
        let mut first = Dog::adopt("Bamse");
        first.rename("Rex");
        let second = Dog::adopt("Lassie");
        store.save(&mut first.root().events()).unwrap();
        store.save(&mut second.root().events()).unwrap();

        let mut a = store.get(first.root().id(), Dog::KIND, 0).unwrap();
        let mut b = store.get(first.root().id(), Dog::KIND, 0).unwrap();
        let mut c = store.get(second.root().id(), Dog::KIND, 0).unwrap();

        assert!(a.next());
        assert!(b.next());
        assert!(c.next());
        assert_eq!(a.value().unwrap().version, 1);
        assert_eq!(b.value().unwrap().version, 1);
        assert_eq!(c.value().unwrap().aggregate_id, second.root().id());
        assert_eq!(store.global_events(1, 10).unwrap().len(), 3);

        assert!(a.next());
        assert_eq!(a.value().unwrap().version, 2);
        assert!(!a.next());
        assert!(!c.next());
        a.close().unwrap();
        c.close().unwrap();

        assert!(b.next());
        assert_eq!(b.value().unwrap().version, 2);
        b.close().unwrap();
    }

    #[test]
    fn test_file_reader_keeps_its_view_during_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvEventStore::open_path(dir.path().join("events.db"), registry()).unwrap();
        let mut dog = Dog::adopt("Bamse");
        store.save(&mut dog.root().events()).unwrap();

        let mut iter = store.get(dog.root().id(), Dog::KIND, 0).unwrap();
        assert!(iter.next());
        assert_eq!(iter.value().unwrap().version, 1);

        dog.rename("Rex");
        store.save(&mut dog.root().events()[1..].to_vec()).unwrap();

        assert!(!iter.next());
        iter.close().unwrap();

        let read = collect_events(store.get(dog.root().id(), Dog::KIND, 0).unwrap()).unwrap();
        assert_eq!(read.len(), 2);
    }
}
