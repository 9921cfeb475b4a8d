//! Application configuration, loaded once from a TOML file.
//!
//! The loaded `AppConfig` is passed explicitly to every component that needs
//! it. Optional sections fall back to defaults; `validate()` rejects values
//! that would make a run meaningless (no coins, zero rate limit, bad URL)
//! before any network activity happens.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::provider::TrackedCoins;
use crate::data::throttle::Throttle;
use crate::logging::LoggingConfig;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Errors raised while loading or validating configuration.
///
/// Always fatal: a run never starts with a configuration that failed here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cryptocurrencies: CoinsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub coingecko: CoinGeckoConfig,
}

/// Connection settings for the CoinGecko API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinGeckoConfig {
    /// Base URL without trailing slash, e.g. `https://api.coingecko.com/api/v3`.
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on calls per minute. Every call is followed by a sleep of
    /// `60 / rate_limit_per_minute` seconds.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Quote currency for prices and market caps.
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl CoinGeckoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum spacing enforced after each API call.
    pub fn throttle_interval(&self) -> Duration {
        Throttle::per_minute(self.rate_limit_per_minute).interval()
    }

    /// Full URL of the market data endpoint.
    pub fn market_data_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.market_data)
    }

    /// Full URL of the connectivity check endpoint.
    pub fn ping_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.ping)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointsConfig {
    #[serde(default = "default_market_data_endpoint")]
    pub market_data: String,

    #[serde(default = "default_ping_endpoint")]
    pub ping: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            market_data: default_market_data_endpoint(),
            ping: default_ping_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinsConfig {
    pub tracked_coins: Vec<String>,
}

/// Where artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Normalization policy knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizeConfig {
    /// Skip records without an `id` instead of keeping them with an empty `coin_id`.
    #[serde(default)]
    pub require_coin_id: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_per_minute() -> u32 {
    50
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_market_data_endpoint() -> String {
    "/coins/markets".to_string()
}

fn default_ping_endpoint() -> String {
    "/ping".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data").join("raw")
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = &self.api.coingecko;

        reqwest::Url::parse(&api.base_url).map_err(|e| {
            ConfigError::Invalid(format!("api.coingecko.base_url '{}': {e}", api.base_url))
        })?;
        if api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.coingecko.timeout_secs must be greater than zero".into(),
            ));
        }
        if api.rate_limit_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "api.coingecko.rate_limit_per_minute must be greater than zero".into(),
            ));
        }
        if api.vs_currency.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "api.coingecko.vs_currency must not be empty".into(),
            ));
        }
        if api.endpoints.market_data.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "api.coingecko.endpoints.market_data must not be empty".into(),
            ));
        }

        self.tracked_coins()?;
        self.logging.validate()?;
        Ok(())
    }

    /// The validated tracked coin set.
    pub fn tracked_coins(&self) -> Result<TrackedCoins, ConfigError> {
        TrackedCoins::new(self.cryptocurrencies.tracked_coins.clone())
    }
}
