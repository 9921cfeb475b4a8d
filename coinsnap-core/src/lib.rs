//! coinsnap core: market snapshot pipeline.
//!
//! One run fetches a market snapshot for the tracked coins from CoinGecko,
//! normalizes it into a fixed sixteen-column schema and persists it as a
//! timestamped CSV artifact. Scheduling and retries belong to whoever invokes
//! the run.

pub mod artifact;
pub mod config;
pub mod data;
pub mod logging;
pub mod pipeline;
pub mod validate;

pub use artifact::{ArtifactWriter, WriteError};
pub use config::{AppConfig, ConfigError};
pub use data::{CoinGeckoClient, FetchError, MarketDataSource, NormalizedRow, TrackedCoins};
pub use pipeline::{Pipeline, RunOutcome, Stage};
pub use validate::{validate_artifact, ArtifactReport, ValidationError};
