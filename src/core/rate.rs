//! Rate data model shared by the refresh and query paths

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result of one fetch cycle: every rate relative to `base_currency`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub base_currency: String,
    pub rates: BTreeMap<String, f64>,
    /// Provider-supplied production time, when the provider reports one.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    pub fn new(base_currency: &str) -> Self {
        Self {
            base_currency: base_currency.to_string(),
            rates: BTreeMap::new(),
            fetched_at: None,
        }
    }

    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.rates.insert(currency.to_string(), rate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Expands the snapshot into one pending row per currency.
    pub fn to_records(&self) -> Vec<NewRateRecord> {
        self.rates
            .iter()
            .map(|(currency, rate)| NewRateRecord {
                currency: currency.clone(),
                rate: *rate,
            })
            .collect()
    }
}

/// A row waiting to be written; the store assigns `id` and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRateRecord {
    pub currency: String,
    pub rate: f64,
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: u64,
    pub currency: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

/// Published after a snapshot has been committed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshEvent {
    /// Count of successful refresh cycles since the scheduler started.
    pub generation: u64,
    pub currencies: Vec<String>,
    pub written: usize,
    pub updated_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
}
