//! Fixed output schema for one coin's market snapshot.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Column names of a persisted artifact, in order.
pub const COLUMNS: [&str; 16] = [
    "timestamp",
    "coin_id",
    "symbol",
    "name",
    "current_price",
    "market_cap",
    "market_cap_rank",
    "total_volume",
    "price_change_24h",
    "price_change_percentage_24h",
    "market_cap_change_24h",
    "market_cap_change_percentage_24h",
    "circulating_supply",
    "total_supply",
    "max_supply",
    "last_updated",
];

/// Columns that must carry at least one value in a healthy artifact.
pub const KEY_NUMERIC_COLUMNS: [&str; 3] = ["current_price", "market_cap", "total_volume"];

/// One normalized row.
///
/// Every field but `timestamp` may be absent. Absent stays absent: nothing is
/// defaulted to zero or an empty string, so downstream aggregates are not skewed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    /// Run instant, shared by every row of a run.
    pub timestamp: DateTime<Utc>,
    pub coin_id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u64>,
    pub total_volume: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap_change_24h: Option<f64>,
    pub market_cap_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    /// Upstream's own update time, passed through as-is.
    pub last_updated: Option<String>,
}

impl NormalizedRow {
    /// A row with only the timestamp set.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            coin_id: None,
            symbol: None,
            name: None,
            current_price: None,
            market_cap: None,
            market_cap_rank: None,
            total_volume: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
            market_cap_change_24h: None,
            market_cap_change_percentage_24h: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            last_updated: None,
        }
    }

    /// Cell values in `COLUMNS` order. Absent fields become empty cells.
    pub fn to_record(&self) -> [String; 16] {
        [
            format_timestamp(&self.timestamp),
            opt_str(&self.coin_id),
            opt_str(&self.symbol),
            opt_str(&self.name),
            opt_num(self.current_price),
            opt_num(self.market_cap),
            self.market_cap_rank.map(|r| r.to_string()).unwrap_or_default(),
            opt_num(self.total_volume),
            opt_num(self.price_change_24h),
            opt_num(self.price_change_percentage_24h),
            opt_num(self.market_cap_change_24h),
            opt_num(self.market_cap_change_percentage_24h),
            opt_num(self.circulating_supply),
            opt_num(self.total_supply),
            opt_num(self.max_supply),
            opt_str(&self.last_updated),
        ]
    }
}

/// RFC 3339 with microseconds and a `Z` suffix, e.g. `2024-05-01T12:00:00.123456Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_str(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}
