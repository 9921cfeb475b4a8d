//! CoinGecko market data client.
//!
//! Issues exactly one blocking GET per call against the `coins/markets`
//! endpoint, with a bounded timeout and the post-call throttle. There are no
//! retries and no backoff: a failed call is classified and surfaced
//! immediately, and the invoking scheduler decides when to try again.

use super::provider::{FetchError, MarketDataSource, RawMarketRecord, TrackedCoins};
use super::throttle::Throttle;
use crate::config::CoinGeckoConfig;
use tracing::{error, info, warn};

/// Blocking HTTP client for the CoinGecko API.
pub struct CoinGeckoClient {
    client: reqwest::blocking::Client,
    market_data_url: String,
    ping_url: String,
    vs_currency: String,
    throttle: Throttle,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("coinsnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            market_data_url: config.market_data_url(),
            ping_url: config.ping_url(),
            vs_currency: config.vs_currency.clone(),
            throttle: Throttle::new(config.throttle_interval()),
        })
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    /// Query parameters for a market data request, in the order they are sent.
    pub fn query_params(coins: &TrackedCoins, vs_currency: &str) -> Vec<(&'static str, String)> {
        vec![
            ("ids", coins.joined()),
            ("vs_currency", vs_currency.to_string()),
            ("include_market_cap", "true".to_string()),
            ("include_24hr_vol", "true".to_string()),
            ("include_24hr_change", "true".to_string()),
            ("include_last_updated_at", "true".to_string()),
        ]
    }

    /// Check that the API is reachable and answering with a 2xx status.
    pub fn ping(&self) -> Result<(), FetchError> {
        info!(url = %self.ping_url, "pinging market data API");
        self.throttle
            .after(|| self.get_body(&self.ping_url, &[]))
            .map(|_| ())
            .map_err(|e| {
                error!(url = %self.ping_url, error = %e, "API ping failed");
                e
            })
    }

    /// Send one GET and return the body of a 2xx response.
    fn get_body(&self, url: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        resp.text().map_err(classify_transport)
    }

    fn request_market_data(&self, coins: &TrackedCoins) -> Result<Vec<RawMarketRecord>, FetchError> {
        let params = Self::query_params(coins, &self.vs_currency);
        let body = self.get_body(&self.market_data_url, &params)?;
        serde_json::from_str::<Vec<RawMarketRecord>>(&body)
            .map_err(|e| FetchError::Decode(format!("expected a JSON array of records: {e}")))
    }
}

fn classify_transport(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transport(format!("request timed out: {e}"))
    } else {
        FetchError::Transport(e.to_string())
    }
}

impl MarketDataSource for CoinGeckoClient {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch_market_data(&self, coins: &TrackedCoins) -> Result<Vec<RawMarketRecord>, FetchError> {
        info!(
            url = %self.market_data_url,
            coins = coins.len(),
            "fetching market data for {} cryptocurrencies",
            coins.len()
        );
        if coins.duplicate_count() > 0 {
            warn!(
                duplicates = coins.duplicate_count(),
                "tracked coin list contains duplicates"
            );
        }

        let result = self.throttle.after(|| self.request_market_data(coins));
        match &result {
            Ok(records) => info!(records = records.len(), "received market data"),
            Err(e) => error!(url = %self.market_data_url, error = %e, "API request failed"),
        }
        result
    }
}
