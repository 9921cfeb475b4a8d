//! Market data acquisition and normalization

pub mod coingecko;
pub mod normalize;
pub mod provider;
pub mod schema;
pub mod throttle;

pub use coingecko::CoinGeckoClient;
pub use normalize::{normalize, NormalizeSummary, Normalizer, RecordError};
pub use provider::{FetchError, MarketDataSource, RawMarketRecord, TrackedCoins};
pub use schema::{NormalizedRow, COLUMNS};
pub use throttle::Throttle;
