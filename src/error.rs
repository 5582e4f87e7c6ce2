//! Error types for scrape-pipeline
//!
//! Errors fall into two groups:
//! - [`Error`]: faults that abort a run (configuration, discovery, persistence)
//! - [`FetchError`]: per-task faults that are recovered locally and only counted

use thiserror::Error;

/// Result type alias for scrape-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scrape-pipeline
///
/// Every variant here is fatal to the run that produced it. Per-task fetch
/// faults never surface as an `Error`; they are converted into a failed
/// [`Task`](crate::types::Task) instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "flush_threshold")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// HTTP client could not be built
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (reading configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pagination probe failed, so the task list could not be built
    #[error("pagination discovery failed for {url}: {reason}")]
    Discovery {
        /// The probed URL
        url: String,
        /// Why discovery failed
        reason: String,
    },

    /// A pipeline stage stopped unexpectedly (worker panic, closed queue)
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Resource not configured
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Batch transaction failed; nothing from the batch was committed
    #[error("batch commit failed for {collection}: {reason}")]
    CommitFailed {
        /// Collection the batch was written to
        collection: String,
        /// Underlying reason
        reason: String,
    },
}

/// Fault raised while fetching a single task.
///
/// Recovered by the fetcher: the task is marked failed and the fault is logged.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the response body could not be read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP status {status}")]
    Status {
        /// Response status code
        status: u16,
    },

    /// The body was not valid JSON
    #[error("invalid JSON body: {0}")]
    Decode(String),

    /// The body decoded but a record was not a JSON object
    #[error("unexpected record shape at {path}: {found}")]
    Shape {
        /// Key path that was traversed
        path: String,
        /// JSON type that was found instead of an object
        found: &'static str,
    },
}

impl FetchError {
    /// Whether this fault was caused by the per-request timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(e) if e.is_timeout())
    }

    /// Whether this fault was caused by a failed connection
    pub fn is_connect(&self) -> bool {
        matches!(self, FetchError::Request(e) if e.is_connect())
    }
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
