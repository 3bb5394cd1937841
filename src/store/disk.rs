use crate::core::error::StoreError;
use crate::core::rate::{NewRateRecord, RateRecord};
use crate::core::store::{RateStore, next_write_time, validate_record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const RATES_PARTITION: &str = "rates";
const META_PARTITION: &str = "meta";
const META_KEY: &str = "writer";

/// Counter state persisted alongside every batch.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreMeta {
    next_id: u64,
    last_updated_at: Option<DateTime<Utc>>,
}

/// Rate store backed by an fjall keyspace.
///
/// Rows live under `currency ++ 0x00 ++ id (big endian)`, so a prefix scan
/// returns one currency's history in id order.
pub struct FjallRateStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
    meta: PartitionHandle,
    writer: Mutex<StoreMeta>,
}

impl FjallRateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let keyspace = Config::new(path).open()?;
        let rates = keyspace.open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;

        let state = match meta.get(META_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => StoreMeta::default(),
        };
        debug!(path = %path.display(), next_id = state.next_id, "Opened rate store");

        Ok(Self {
            keyspace,
            rates,
            meta,
            writer: Mutex::new(state),
        })
    }

    fn currency_prefix(currency: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(currency.len() + 9);
        key.extend_from_slice(currency.as_bytes());
        key.push(0);
        key
    }

    fn record_key(currency: &str, id: u64) -> Vec<u8> {
        let mut key = Self::currency_prefix(currency);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn sync(&self) {
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            warn!("Rate store sync failed: {}", e);
        }
    }
}

#[async_trait]
impl RateStore for FjallRateStore {
    async fn create_schema(&self) -> Result<(), StoreError> {
        let state = self.writer.lock().await;
        if self.meta.get(META_KEY)?.is_none() {
            self.meta.insert(META_KEY, serde_json::to_vec(&*state)?)?;
            self.sync();
            debug!("Initialised rate store metadata");
        }
        Ok(())
    }

    async fn insert_batch(&self, records: &[NewRateRecord]) -> Result<Vec<RateRecord>, StoreError> {
        let mut state = self.writer.lock().await;

        let updated_at = next_write_time(state.last_updated_at);
        let mut next = state.clone();
        let mut batch = self.keyspace.batch();
        let mut written = Vec::with_capacity(records.len());

        for record in records {
            // An invalid row drops the whole uncommitted batch
            validate_record(record)?;
            next.next_id += 1;
            let row = RateRecord {
                id: next.next_id,
                currency: record.currency.clone(),
                rate: record.rate,
                updated_at,
            };
            batch.insert(
                &self.rates,
                Self::record_key(&row.currency, row.id),
                serde_json::to_vec(&row)?,
            );
            written.push(row);
        }

        if written.is_empty() {
            return Ok(written);
        }

        next.last_updated_at = Some(updated_at);
        batch.insert(&self.meta, META_KEY, serde_json::to_vec(&next)?);
        batch.commit()?;
        *state = next;
        self.sync();

        debug!(written = written.len(), "Rate batch committed");
        Ok(written)
    }

    async fn query_latest(&self, currency: &str) -> Result<Option<RateRecord>, StoreError> {
        if currency.is_empty() || currency.contains('\0') {
            return Ok(None);
        }

        let snapshot = self.rates.snapshot_at(self.keyspace.instant());
        match snapshot.prefix(Self::currency_prefix(currency)).next_back() {
            Some(entry) => {
                let (key, value) = entry.map_err(fjall::Error::from)?;
                let record: RateRecord = serde_json::from_slice(&value)?;
                if record.currency != currency {
                    return Err(StoreError::Corrupt(format!(
                        "key {key:?} holds a row for {}",
                        record.currency
                    )));
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let snapshot = self.rates.snapshot_at(self.keyspace.instant());
        let mut count = 0;
        for entry in snapshot.iter() {
            entry.map_err(fjall::Error::from)?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    fn batch(entries: &[(&str, f64)]) -> Vec<NewRateRecord> {
        entries
            .iter()
            .map(|(currency, rate)| NewRateRecord {
                currency: currency.to_string(),
                rate: *rate,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fjall_store_insert_and_query() {
        let dir = tempdir().unwrap();
        let store = FjallRateStore::open(dir.path()).unwrap();
        store.create_schema().await.unwrap();

        // Initially, store is empty
        assert!(store.query_latest("EUR").await.unwrap().is_none());

        let written = store
            .insert_batch(&batch(&[("EUR", 0.9), ("GBP", 0.8)]))
            .await
            .unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].updated_at, written[1].updated_at);

        let eur = store.query_latest("EUR").await.unwrap().unwrap();
        assert_eq!(eur.rate, 0.9);
        assert_eq!(eur.currency, "EUR");
        assert!(store.query_latest("CAD").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fjall_store_prefix_does_not_bleed() {
        let dir = tempdir().unwrap();
        let store = FjallRateStore::open(dir.path()).unwrap();

        store.insert_batch(&batch(&[("EURX", 2.0)])).await.unwrap();
        assert!(store.query_latest("EUR").await.unwrap().is_none());
        assert!(store.query_latest("EU").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fjall_store_latest_wins() {
        let dir = tempdir().unwrap();
        let store = FjallRateStore::open(dir.path()).unwrap();

        store.insert_batch(&batch(&[("USD", 1.0)])).await.unwrap();
        store
            .insert_batch(&batch(&[("EUR", 0.9), ("USD", 1.02)]))
            .await
            .unwrap();

        let usd = store.query_latest("USD").await.unwrap().unwrap();
        assert_eq!(usd.rate, 1.02);
        assert_eq!(usd.id, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_fjall_store_failed_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = FjallRateStore::open(dir.path()).unwrap();
        store.insert_batch(&batch(&[("EUR", 0.9)])).await.unwrap();

        let result = store
            .insert_batch(&batch(&[
                ("AUD", 1.5),
                ("CAD", 1.3),
                ("CHF", -0.9),
                ("EUR", 0.95),
                ("GBP", 0.8),
            ]))
            .await;
        assert!(result.is_err());

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.query_latest("AUD").await.unwrap().is_none());
        assert_eq!(store.query_latest("EUR").await.unwrap().unwrap().rate, 0.9);
    }

    #[tokio::test]
    async fn test_fjall_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FjallRateStore::open(dir.path()).unwrap();
            store.create_schema().await.unwrap();
            store.insert_batch(&batch(&[("JPY", 150.0)])).await.unwrap();
        }

        let store = FjallRateStore::open(dir.path()).unwrap();
        // Schema creation is idempotent
        store.create_schema().await.unwrap();
        assert_eq!(store.query_latest("JPY").await.unwrap().unwrap().rate, 150.0);

        let written = store.insert_batch(&batch(&[("JPY", 151.0)])).await.unwrap();
        assert_eq!(written[0].id, 2);
        assert_eq!(store.query_latest("JPY").await.unwrap().unwrap().rate, 151.0);
    }

    #[tokio::test]
    async fn test_fjall_store_open_fails_on_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        assert!(FjallRateStore::open(&file).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fjall_store_concurrent_readers_see_whole_batches() {
        const BATCH: usize = 40;
        const BATCHES: usize = 25;
        let dir = tempdir().unwrap();
        let store = Arc::new(FjallRateStore::open(dir.path()).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = Arc::clone(&store);
                let done = Arc::clone(&done);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while !done.load(Ordering::SeqCst) {
                        seen.push(store.count().await.unwrap());
                        // C039 is the last row of every batch, so its batch's C000
                        // must already be visible
                        if let Some(last) = store.query_latest("C039").await.unwrap() {
                            let first = store.query_latest("C000").await.unwrap().unwrap();
                            assert!(first.id + BATCH as u64 > last.id);
                        }
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        let rows: Vec<NewRateRecord> = (0..BATCH)
            .map(|i| NewRateRecord {
                currency: format!("C{i:03}"),
                rate: 1.0 + i as f64,
            })
            .collect();
        for _ in 0..BATCHES {
            store.insert_batch(&rows).await.unwrap();
            tokio::task::yield_now().await;
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            let seen = reader.await.unwrap();
            assert!(seen.iter().all(|count| count % BATCH == 0), "torn read: {seen:?}");
        }
        assert_eq!(store.count().await.unwrap(), BATCH * BATCHES);
    }
}
