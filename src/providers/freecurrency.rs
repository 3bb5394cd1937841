use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::error::FetchError;
use crate::core::rate::RateSnapshot;
use crate::core::source::RateSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches latest rates from a freecurrencyapi-compatible endpoint.
pub struct FreeCurrencyApiSource {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl FreeCurrencyApiSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, FetchError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .user_agent("ratecache/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(FreeCurrencyApiSource {
            base_url,
            api_key,
            client,
        })
    }

    fn latest_url(&self, base: &str, targets: &[String]) -> Result<Url, FetchError> {
        let endpoint = format!("{}/latest", self.base_url);
        let mut params = vec![
            ("base_currency", base.to_string()),
            ("currencies", targets.join(",")),
        ];
        if let Some(key) = &self.api_key {
            params.push(("apikey", key.clone()));
        }

        Url::parse_with_params(&endpoint, &params).map_err(|e| FetchError::InvalidUrl {
            url: endpoint.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    data: Option<BTreeMap<String, f64>>,
    /// Unix seconds; zero or absent when the provider does not report it.
    time: Option<i64>,
}

fn to_snapshot(base: &str, response: LatestResponse) -> Result<RateSnapshot, FetchError> {
    let rates = response
        .data
        .ok_or_else(|| FetchError::Malformed("response has no data object".to_string()))?;

    if let Some((currency, rate)) = rates
        .iter()
        .find(|(_, rate)| !rate.is_finite() || **rate <= 0.0)
    {
        return Err(FetchError::Malformed(format!(
            "non-positive rate {rate} for {currency}"
        )));
    }

    let fetched_at = response
        .time
        .filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    Ok(RateSnapshot {
        base_currency: base.to_string(),
        rates,
        fetched_at,
    })
}

#[async_trait]
impl RateSource for FreeCurrencyApiSource {
    #[instrument(
        name = "RateFetch",
        skip(self, targets),
        fields(base = %base, targets = targets.len())
    )]
    async fn fetch(&self, base: &str, targets: &[String]) -> Result<RateSnapshot, FetchError> {
        let url = self.latest_url(base, targets)?;
        debug!(endpoint = %url.path(), "Requesting latest rates");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: format!("{}/latest", self.base_url),
            });
        }

        let text = response.text().await?;
        let data: LatestResponse = serde_json::from_str(&text)
            .map_err(|e| FetchError::Malformed(format!("failed to parse JSON response: {e}")))?;

        let snapshot = to_snapshot(base, data)?;
        debug!(rates = snapshot.rates.len(), "Received latest rates");
        Ok(snapshot)
    }
}
