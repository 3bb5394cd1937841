use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const API_KEY_ENV: &str = "API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.freecurrencyapi.com/v1";
const DEFAULT_DATA_PATH: &str = "currency.db";

/// How lookup input is matched against stored currency codes.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    /// Codes must match stored codes exactly.
    #[default]
    Exact,
    /// Input is uppercased before matching.
    Uppercase,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub data_path: Option<String>,
    #[serde(default)]
    pub case_policy: CasePolicy,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_currencies() -> Vec<String> {
    ["EUR", "USD", "RUB", "GBP", "JPY"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            refresh_interval_secs: default_refresh_interval_secs(),
            base_currency: default_base_currency(),
            currencies: default_currencies(),
            provider: ProviderConfig::default(),
            data_path: None,
            case_policy: CasePolicy::default(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratecache", "ratecache")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        if self.query_timeout_secs == 0 {
            bail!("query_timeout_secs must be greater than zero");
        }
        if self.base_currency.trim().is_empty() {
            bail!("base_currency must not be empty");
        }
        if self.currencies.iter().all(|c| c.trim().is_empty()) {
            bail!("currencies must name at least one currency");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Target currencies with blanks dropped and surrounding whitespace trimmed.
    pub fn target_currencies(&self) -> Vec<String> {
        self.currencies
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(self.data_path.as_deref().unwrap_or(DEFAULT_DATA_PATH))
    }

    /// Resolves the API key from the process environment, then the config file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|key| !key.is_empty())
            .or_else(|| self.provider.api_key.clone())
    }
}
