use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    /// An event sourcing condition such as a concurrency conflict.
    #[error(transparent)]
    Store(#[from] eventsourcing::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.into())
    }
}

impl From<Error> for eventsourcing::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Store(inner) => inner,
            other => eventsourcing::Error::backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
