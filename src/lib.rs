pub mod cli;
pub mod core;
pub mod providers;
pub mod query;
pub mod refresh;
pub mod store;

use crate::cli::{LineInput, Shell};
use crate::core::config::{API_KEY_ENV, AppConfig};
use crate::providers::FreeCurrencyApiSource;
use crate::query::QueryCoordinator;
use crate::refresh::{RefreshScheduler, RefreshSettings};
use anyhow::{Context, Result};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Rate cache starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    let input = cli::stdin_lines();
    let mut output = std::io::stdout();
    run_session(&config, input, &mut output, interrupted()).await
}

/// Wires store, source, scheduler and coordinator together and runs one
/// interactive session until it ends or `interrupt` resolves.
pub async fn run_session<L, W, S>(
    config: &AppConfig,
    input: L,
    output: &mut W,
    interrupt: S,
) -> Result<()>
where
    L: LineInput,
    W: Write,
    S: Future<Output = ()>,
{
    config.validate()?;
    debug!(
        interval = ?config.refresh_interval(),
        base = %config.base_currency,
        currencies = ?config.target_currencies(),
        "Loaded config"
    );

    let data_path = config.data_path();
    let store = store::open_store(&data_path)
        .await
        .with_context(|| format!("Failed to initialise rate store at {}", data_path.display()))?;

    let api_key = config.api_key();
    if api_key.is_none() {
        warn!(
            "No API key configured; set {} to authenticate with the rate provider",
            API_KEY_ENV
        );
    }
    let source = FreeCurrencyApiSource::new(&config.provider.base_url, api_key)
        .context("Failed to configure rate source")?;

    let scheduler = RefreshScheduler::new(
        Arc::new(source),
        Arc::clone(&store),
        RefreshSettings {
            interval: config.refresh_interval(),
            base_currency: config.base_currency.trim().to_string(),
            currencies: config.target_currencies(),
        },
    );
    let coordinator =
        QueryCoordinator::new(store, scheduler.subscribe()).with_case_policy(config.case_policy);
    let scheduler = scheduler.spawn();

    let shell = Shell::new(coordinator, config.query_timeout());
    let result = tokio::select! {
        result = shell.run(input, output) => result,
        _ = interrupt => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    scheduler.shutdown().await;
    result
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
