//! Event sourcing core: aggregates rebuilt from an ordered, immutable log.
//!
//! An aggregate's state is never stored directly. Every change is recorded as
//! an [`Event`], buffered on the aggregate until it is committed, and the
//! current state is recovered by replaying the committed events in order.
//!
//! # Core Concepts
//!
//! ## Aggregate and AggregateRoot
//!
//! An aggregate embeds an [`AggregateRoot`] and implements [`Aggregate`]:
//! a declared kind tag, a state-transition handler, and the list of event
//! payloads it produces. State-changing methods call
//! [`Aggregate::track_change`], which buffers the event and applies it at
//! once so reads reflect the change without a reload.
//!
//! ## Versions
//!
//! - `version` counts events within one aggregate, starting at 1.
//! - `global_version` is assigned by the store at commit time and orders
//!   events across every aggregate in that store.
//!
//! ## Stores
//!
//! [`EventStore`] and [`SnapshotStore`] are the persistence boundary.
//! Conflicts are detected optimistically: [`EventStore::save`] fails with
//! [`Error::Concurrency`] when someone else committed first, and the caller
//! reloads and retries. Reads go through an [`EventIterator`].
//!
//! ## Registry
//!
//! Stored payloads are decoded through a [`Registry`] keyed by aggregate
//! kind and event reason. Unregistered events are skipped on read, so a
//! reader keeps working while newer writers add event types.
//!
//! # Example
//!
//! ```
//! use eventsourcing::{Aggregate, AggregateRoot, Event, EventPayload, MemoryEventStore, Registry, Repository};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default)]
//! struct Account {
//!     root: AggregateRoot,
//!     balance: i64,
//! }
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Deposited {
//!     amount: i64,
//! }
//!
//! impl EventPayload for Deposited {
//!     const REASON: &'static str = "Deposited";
//! }
//!
//! impl Aggregate for Account {
//!     const KIND: &'static str = "Account";
//!
//!     fn root(&self) -> &AggregateRoot { &self.root }
//!     fn root_mut(&mut self) -> &mut AggregateRoot { &mut self.root }
//!
//!     fn transition(&mut self, event: &Event) {
//!         if let Some(d) = event.data_as::<Deposited>() {
//!             self.balance += d.amount;
//!         }
//!     }
//!
//!     fn register(registry: &mut Registry) {
//!         registry.register::<Self, Deposited>();
//!     }
//! }
//!
//! let repo = Repository::new(MemoryEventStore::new());
//!
//! let mut account = Account::default();
//! account.track_change(Deposited { amount: 100 });
//! repo.save(&mut account)?;
//!
//! let loaded: Account = repo.get(account.root().id())?;
//! assert_eq!(loaded.balance, 100);
//! assert_eq!(loaded.root().version(), 1);
//! # Ok::<(), eventsourcing::Error>(())
//! ```

mod aggregate;
mod error;
mod event;
mod memory;
mod repository;
mod serializer;
mod store;

#[cfg(test)]
mod testing;

pub use aggregate::{Aggregate, AggregateRoot, IdGenerator};
pub use error::{Error, Result};
pub use event::{Event, EventPayload, Metadata, Payload, Version};
pub use memory::{MemoryEventStore, MemoryIterator, MemorySnapshotStore};
pub use repository::{Repository, SnapshotRepository};
pub use serializer::{Factory, JsonSerializer, Registry, Serializer};
pub use store::{EventIterator, EventStore, Snapshot, SnapshotStore, collect_events, validate_events};
