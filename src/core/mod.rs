//! Core rate abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod rate;
pub mod source;
pub mod store;

// Re-export main types for cleaner imports
pub use error::{FetchError, QueryError, RefreshError, StoreError};
pub use rate::{NewRateRecord, RateRecord, RateSnapshot, RefreshEvent};
pub use source::RateSource;
pub use store::RateStore;
