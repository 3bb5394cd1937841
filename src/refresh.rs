//! Periodic refresh of the persisted rate snapshot.
//!
//! One task owns the [`RefreshScheduler`] for the process lifetime. Each tick
//! fetches a snapshot, writes it as one batch and publishes a
//! [`RefreshEvent`] into a single-slot `watch` channel. Ticks never overlap:
//! a cycle that outlasts the interval delays the next tick.

use crate::core::{RateSnapshot, RateSource, RateStore, RefreshError, RefreshEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Persisting,
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub base_currency: String,
    pub currencies: Vec<String>,
}

pub struct RefreshScheduler {
    source: Arc<dyn RateSource>,
    store: Arc<dyn RateStore>,
    settings: RefreshSettings,
    generation: u64,
    events: watch::Sender<Option<RefreshEvent>>,
    state: watch::Sender<RefreshState>,
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn RateStore>,
        settings: RefreshSettings,
    ) -> Self {
        let (events, _) = watch::channel(None);
        let (state, _) = watch::channel(RefreshState::Idle);
        Self {
            source,
            store,
            settings,
            generation: 0,
            events,
            state,
        }
    }

    /// Latest refresh-completed event; `None` until the first commit.
    pub fn subscribe(&self) -> watch::Receiver<Option<RefreshEvent>> {
        self.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    async fn fetch(&self) -> Result<RateSnapshot, RefreshError> {
        self.state.send_replace(RefreshState::Fetching);
        let result = self
            .source
            .fetch(&self.settings.base_currency, &self.settings.currencies)
            .await;
        if result.is_err() {
            self.state.send_replace(RefreshState::Idle);
        }
        result.map_err(RefreshError::from)
    }

    async fn persist(&mut self, snapshot: RateSnapshot) -> Result<RefreshEvent, RefreshError> {
        self.state.send_replace(RefreshState::Persisting);
        let result = self.store.insert_batch(&snapshot.to_records()).await;
        self.state.send_replace(RefreshState::Idle);

        let written = result.map_err(RefreshError::Persist)?;
        self.generation += 1;
        let event = RefreshEvent {
            generation: self.generation,
            currencies: written.iter().map(|r| r.currency.clone()).collect(),
            written: written.len(),
            updated_at: written
                .first()
                .map(|r| r.updated_at)
                .unwrap_or_else(chrono::Utc::now),
            fetched_at: snapshot.fetched_at,
        };

        self.events.send_replace(Some(event.clone()));
        Ok(event)
    }

    /// Runs one fetch + persist cycle.
    pub async fn refresh_once(&mut self) -> Result<RefreshEvent, RefreshError> {
        let snapshot = self.fetch().await?;
        self.persist(snapshot).await
    }

    fn report(result: &Result<RefreshEvent, RefreshError>) {
        match result {
            Ok(event) => info!(
                generation = event.generation,
                written = event.written,
                "Latest rates updated"
            ),
            Err(RefreshError::Fetch(e)) => warn!("Error getting latest rates: {}", e),
            Err(RefreshError::Persist(e)) => warn!("Error saving rates to store: {}", e),
        }
    }

    /// Ticks until `shutdown` flips to true or its sender goes away.
    ///
    /// Shutdown abandons a pending wait or fetch; a persist that has started
    /// always runs to completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?period, "Refresh scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let fetched = tokio::select! {
                result = self.fetch() => result,
                _ = shutdown.changed() => {
                    debug!("Shutdown during fetch, abandoning cycle");
                    self.state.send_replace(RefreshState::Idle);
                    break;
                }
            };

            let result = match fetched {
                Ok(snapshot) => self.persist(snapshot).await,
                Err(e) => Err(e),
            };
            Self::report(&result);
        }

        info!("Refresh scheduler stopped");
    }

    /// Starts the tick loop on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown, task }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops ticking and waits for any in-flight persist to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("Refresh scheduler task failed: {}", e);
        }
    }
}
