//! Market data source trait and structured error types.
//!
//! The `MarketDataSource` trait abstracts over where raw market records come
//! from (the CoinGecko HTTP API in production, canned records in tests), so
//! the pipeline can be exercised without the network.

use thiserror::Error;

use crate::config::ConfigError;

/// One upstream record, exactly as the API returned it.
///
/// Untyped: the normalizer extracts each field on its own, so one malformed
/// field leaves the rest of the record intact.
pub type RawMarketRecord = serde_json::Value;

/// Ordered, non-empty list of coin identifiers tracked for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCoins(Vec<String>);

impl TrackedCoins {
    /// Build a coin set, trimming whitespace around each identifier.
    ///
    /// Rejects an empty list and blank identifiers. Duplicates are kept.
    pub fn new(ids: Vec<String>) -> Result<Self, ConfigError> {
        if ids.is_empty() {
            return Err(ConfigError::Invalid(
                "cryptocurrencies.tracked_coins must contain at least one coin".into(),
            ));
        }

        let mut coins = Vec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            let id = id.trim();
            if id.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "cryptocurrencies.tracked_coins[{i}] is blank"
                )));
            }
            coins.push(id.to_string());
        }
        Ok(Self(coins))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers comma-joined in input order, as the `ids` query parameter expects.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    /// Number of entries that repeat an earlier identifier.
    pub fn duplicate_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.0.iter().filter(|id| !seen.insert(id.as_str())).count()
    }
}

/// Failure classes for a single API call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, connection refused, DNS failure, broken body stream.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Body was not a JSON array.
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

/// Anything that can produce raw market records for a set of coins.
pub trait MarketDataSource {
    /// Human-readable name of this source, used in logs.
    fn name(&self) -> &str;

    /// Fetch one snapshot for all `coins` in a single call.
    fn fetch_market_data(&self, coins: &TrackedCoins) -> Result<Vec<RawMarketRecord>, FetchError>;
}
