use crate::core::error::StoreError;
use crate::core::rate::{NewRateRecord, RateRecord};
use crate::core::store::{RateStore, next_write_time, validate_record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    records: Vec<RateRecord>,
    next_id: u64,
    last_updated_at: Option<DateTime<Utc>>,
}

/// In-memory rate store with the same batch semantics as the disk store.
///
/// Batches are validated and staged outside the read lock, then appended
/// under a short write lock, so readers see a batch entirely or not at all.
#[derive(Default)]
pub struct MemoryRateStore {
    state: RwLock<MemoryState>,
    writer: Mutex<()>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn create_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_batch(&self, records: &[NewRateRecord]) -> Result<Vec<RateRecord>, StoreError> {
        let _writer = self.writer.lock().await;

        let (mut next_id, last_updated_at) = {
            let state = self.state.read().await;
            (state.next_id, state.last_updated_at)
        };
        let updated_at = next_write_time(last_updated_at);

        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            validate_record(record)?;
            next_id += 1;
            staged.push(RateRecord {
                id: next_id,
                currency: record.currency.clone(),
                rate: record.rate,
                updated_at,
            });
        }

        let mut state = self.state.write().await;
        state.records.extend(staged.iter().cloned());
        state.next_id = next_id;
        if !staged.is_empty() {
            state.last_updated_at = Some(updated_at);
        }
        debug!(written = staged.len(), "Memory store batch committed");
        Ok(staged)
    }

    async fn query_latest(&self, currency: &str) -> Result<Option<RateRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.currency == currency)
            .max_by(|a, b| (a.updated_at, a.id).cmp(&(b.updated_at, b.id)))
            .cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.records.len())
    }
}
