//! Error types for the feed sync service.

use thiserror::Error;

/// Failure to retrieve a feed document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The feed URL could not be parsed or uses an unsupported scheme.
    #[error("malformed feed URL: {0}")]
    MalformedUrl(String),

    /// The server answered with something other than 200 OK.
    #[error("unexpected HTTP status: {0}")]
    BadStatus(u16),

    /// Connect, timeout or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The body exceeded the configured size limit.
    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

impl FetchError {
    /// Whether another attempt later has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::BadStatus(code) => {
                *code >= 500 || *code == 408 || *code == 429
            }
            FetchError::MalformedUrl(_) | FetchError::TooLarge { .. } => false,
        }
    }
}

/// Failure to parse a feed document as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document is not well-formed XML (or not UTF-8).
    #[error("malformed feed document: {0}")]
    Malformed(String),
}

/// Failure to hand an entry to its destination.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The local cache rejected the row.
    #[error("store error: {0}")]
    Database(String),

    /// The notification could not be delivered.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl From<sqlx::Error> for SinkError {
    fn from(e: sqlx::Error) -> Self {
        SinkError::Database(e.to_string())
    }
}

/// Failure to read or write persisted watermark state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored state could not be decoded.
    #[error("corrupt watermark state: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// What the scheduler should do after a failed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Try again on the next scheduled occurrence.
    Retry,
    /// Stop scheduling this feed; retrying cannot help.
    GiveUp,
}

/// Common error type for the sync service.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("publish failed: {0}")]
    Sink(#[from] SinkError),

    #[error("watermark state error: {0}")]
    State(#[from] StoreError),

    /// Database error outside of a sink or watermark store.
    #[error("database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Classify the error for the scheduler.
    ///
    /// Structural problems (bad URL, client errors, broken XML, bad config)
    /// give up; everything else is retried on the next tick.
    pub fn disposition(&self) -> Disposition {
        match self {
            SyncError::Fetch(e) if e.is_transient() => Disposition::Retry,
            SyncError::Fetch(_) => Disposition::GiveUp,
            SyncError::Parse(_) => Disposition::GiveUp,
            SyncError::Config(_) => Disposition::GiveUp,
            SyncError::Sink(_)
            | SyncError::State(_)
            | SyncError::Database(_)
            | SyncError::Io(_) => Disposition::Retry,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Database(e.to_string())
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
