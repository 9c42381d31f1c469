//! Error types for eventq.

use std::time::Duration;

use thiserror::Error;

use crate::model::EventId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("event {0} already exists")]
    DuplicateId(EventId),

    #[error("event {0} is not pending")]
    NotPending(EventId),

    #[error("value {0:?} is already assigned to another event")]
    ValueTaken(String),

    #[error("timed out after {waited:?} waiting for event {id} to be processed")]
    Timeout { id: EventId, waited: Duration },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dictionary error: {0}")]
    Dictionary(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Lock contention, dropped connections, and a candidate value lost to a
    /// concurrent worker all clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(e) => !matches!(
                e,
                sqlx::Error::Configuration(_)
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::TypeNotFound { .. }
            ),
            Error::ValueTaken(_) | Error::NotPending(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
