//! Remote rate source abstraction

use super::error::FetchError;
use super::rate::RateSnapshot;
use async_trait::async_trait;

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches current rates of `targets` relative to `base`.
    async fn fetch(&self, base: &str, targets: &[String]) -> Result<RateSnapshot, FetchError>;
}
