//! Error types for the refresh and query paths.

use thiserror::Error;

/// A fetch cycle could not produce a snapshot. Always transient: the
/// scheduler skips the cycle and tries again on the next tick.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed rate response: {0}")]
    Malformed(String),

    #[error("Invalid provider URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Storage failures. Returned from `insert_batch` it means the whole batch
/// was discarded; returned while opening the store it is fatal.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Record encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record for {currency:?}: {reason}")]
    InvalidRecord { currency: String, reason: String },

    #[error("Corrupt storage entry: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Failed to fetch rates: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to persist rates: {0}")]
    Persist(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid currency code: {0}")]
    InvalidInput(String),

    #[error("No rate recorded for {0}")]
    NotFound(String),

    #[error("Failed to read rates: {0}")]
    Store(#[from] StoreError),
}

impl QueryError {
    /// `NotFound` is an ordinary negative answer rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound(_))
    }
}
