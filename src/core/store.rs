//! Durable rate storage abstraction

use super::error::StoreError;
use super::rate::{NewRateRecord, RateRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Append-only storage of rate rows.
///
/// Implementations must commit a batch atomically (readers see all of it or
/// none of it), serialize writers, and never block readers on each other.
/// Rows of one batch share a single `updated_at`, and `updated_at` never
/// decreases from one batch to the next, so id order is also time order.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Prepares the storage. Safe to call on every startup.
    async fn create_schema(&self) -> Result<(), StoreError>;

    /// Writes all `records` as one atomic unit and returns the stored rows.
    async fn insert_batch(&self, records: &[NewRateRecord]) -> Result<Vec<RateRecord>, StoreError>;

    /// Returns the most recent row for `currency` (highest `updated_at`,
    /// then highest `id`).
    async fn query_latest(&self, currency: &str) -> Result<Option<RateRecord>, StoreError>;

    /// Total number of persisted rows.
    async fn count(&self) -> Result<usize, StoreError>;
}

pub(crate) fn validate_record(record: &NewRateRecord) -> Result<(), StoreError> {
    let reason = if record.currency.is_empty() {
        Some("empty currency code")
    } else if record.currency.contains('\0') {
        Some("currency code contains a NUL byte")
    } else if !record.rate.is_finite() || record.rate <= 0.0 {
        Some("rate must be a positive finite number")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidRecord {
            currency: record.currency.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Write time for the next batch, clamped so it never precedes the last one.
pub(crate) fn next_write_time(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}
