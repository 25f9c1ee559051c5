//! Error types for the carelog ETL pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Failures that terminate a pipeline stage.
///
/// Rows without a natural key are not errors; the staging loader counts
/// and drops them.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source file could not be opened
    #[error("Cannot open source '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source could not be tokenized into records
    #[error("Malformed record {record} in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        /// 1-based index of the data record, header excluded
        record: u64,
        #[source]
        source: csv_async::Error,
    },

    /// A statement was rejected by the database or the connection failed
    #[error("Database error while {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Attach a description of the running statement to a `sqlx` failure.
pub trait DbContext<T> {
    fn db_context(self, context: impl Into<String>) -> Result<T>;

    /// Like [`db_context`](DbContext::db_context), built only on failure
    fn with_db_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> DbContext<T> for std::result::Result<T, sqlx::Error> {
    fn db_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| EtlError::Database {
            context: context.into(),
            source,
        })
    }

    fn with_db_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| EtlError::Database {
            context: f(),
            source,
        })
    }
}
