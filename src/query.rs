//! Currency lookups against the persisted rate store.

use crate::core::config::CasePolicy;
use crate::core::{QueryError, RateRecord, RateStore, RefreshEvent, StoreError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Answers "current rate for currency C" from committed data only.
///
/// Cheap to clone; every clone shares the store and observes the same
/// refresh notifications. Lookups never write, so any number may run at once.
#[derive(Clone)]
pub struct QueryCoordinator {
    store: Arc<dyn RateStore>,
    refreshes: watch::Receiver<Option<RefreshEvent>>,
    case_policy: CasePolicy,
}

impl QueryCoordinator {
    pub fn new(
        store: Arc<dyn RateStore>,
        refreshes: watch::Receiver<Option<RefreshEvent>>,
    ) -> Self {
        Self {
            store,
            refreshes,
            case_policy: CasePolicy::default(),
        }
    }

    pub fn with_case_policy(mut self, case_policy: CasePolicy) -> Self {
        self.case_policy = case_policy;
        self
    }

    /// Trims `input` and applies the case policy. Rejects empty codes and
    /// codes with inner whitespace or control characters.
    pub fn normalize(&self, input: &str) -> Result<String, QueryError> {
        let code = input.trim();
        if code.is_empty() {
            return Err(QueryError::InvalidInput(
                "currency code cannot be empty".to_string(),
            ));
        }
        if code.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(QueryError::InvalidInput(format!(
                "{code:?} is not a single currency code"
            )));
        }

        Ok(match self.case_policy {
            CasePolicy::Exact => code.to_string(),
            CasePolicy::Uppercase => code.to_uppercase(),
        })
    }

    /// Returns the latest stored row for the currency named by `input`.
    pub async fn lookup(&self, input: &str) -> Result<RateRecord, QueryError> {
        let code = self.normalize(input)?;

        // Everything announced before the read must be visible to it
        let announced = self
            .refreshes
            .borrow()
            .as_ref()
            .filter(|event| event.currencies.contains(&code))
            .map(|event| (event.generation, event.updated_at));

        let record = self.store.query_latest(&code).await?;
        debug!(currency = %code, found = record.is_some(), "Rate lookup");

        match (record, announced) {
            (Some(record), Some((generation, updated_at))) if record.updated_at < updated_at => {
                Err(QueryError::Store(StoreError::Corrupt(format!(
                    "store returned {code} from before refresh {generation}"
                ))))
            }
            (None, Some((generation, _))) => Err(QueryError::Store(StoreError::Corrupt(format!(
                "store has no {code} although refresh {generation} wrote it"
            )))),
            (Some(record), _) => Ok(record),
            (None, None) => Err(QueryError::NotFound(code)),
        }
    }

    pub async fn rate(&self, input: &str) -> Result<f64, QueryError> {
        self.lookup(input).await.map(|record| record.rate)
    }

    /// The most recent refresh this coordinator has been told about.
    pub fn last_refresh(&self) -> Option<RefreshEvent> {
        self.refreshes.borrow().clone()
    }

    /// Waits for the next refresh notification. Returns `None` once the
    /// scheduler is gone.
    pub async fn wait_for_refresh(&mut self) -> Option<RefreshEvent> {
        self.refreshes.changed().await.ok()?;
        self.refreshes.borrow_and_update().clone()
    }
}
