//! Event sourcing error types.

use thiserror::Error;

/// Errors crossing the event sourcing boundary.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An identifier was assigned to an aggregate that already has one.
    #[error("aggregate id is already set")]
    AlreadyExists,

    /// The requested aggregate has no events, so it does not exist.
    #[error("no events")]
    NoEvents,

    /// An iterator has no more events to deliver.
    #[error("no more events")]
    NoMoreEvents,

    /// The stored version of the aggregate differs from what the batch expects.
    ///
    /// The caller should reload the aggregate and retry.
    #[error("concurrency error: stored version does not match the batch")]
    Concurrency,

    /// No snapshot exists for the aggregate.
    #[error("snapshot not found")]
    SnapshotNotFound,

    /// A snapshot was requested for an aggregate that still has unsaved events.
    #[error("aggregate has unsaved events")]
    UnsavedEvents,

    /// An aggregate id was required but empty.
    #[error("aggregate id is empty")]
    EmptyAggregateId,

    /// A batch handed to `save` is malformed.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// A registered event type could not be reconstructed from storage.
    #[error("could not deserialize {aggregate_type}/{reason}: {source}")]
    Deserialize {
        aggregate_type: String,
        reason: String,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding or decoding a payload or record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a backend-specific failure.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
