//! Record normalization: raw upstream JSON → fixed-schema rows.
//!
//! Tolerance works at two levels:
//! - **Field**: each of the fifteen source fields is extracted on its own. A
//!   missing, `null` or wrong-typed value yields `None` for that field only.
//! - **Record**: a record that cannot be read at all (not a JSON object) is
//!   skipped and logged; the rest of the batch is unaffected.
//!
//! Per-record outcomes are explicit `Result`s. Failures go to the log, never
//! to the caller, so the row count may be lower than the input count.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::provider::RawMarketRecord;
use super::schema::NormalizedRow;
use crate::config::NormalizeConfig;

/// Why a single record was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not a JSON object (found {0})")]
    NotAnObject(&'static str),

    #[error("record has no coin id")]
    MissingCoinId,
}

/// Counts from one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub received: usize,
    pub produced: usize,
    pub skipped: usize,
}

/// Converts raw records into `NormalizedRow`s.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    require_coin_id: bool,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            require_coin_id: config.require_coin_id,
        }
    }

    /// Normalize a batch. Every row gets `run_timestamp`; input order is kept.
    pub fn normalize(
        &self,
        records: &[RawMarketRecord],
        run_timestamp: DateTime<Utc>,
    ) -> Vec<NormalizedRow> {
        self.normalize_with_summary(records, run_timestamp).0
    }

    /// Like `normalize`, also returning the received/produced/skipped counts.
    pub fn normalize_with_summary(
        &self,
        records: &[RawMarketRecord],
        run_timestamp: DateTime<Utc>,
    ) -> (Vec<NormalizedRow>, NormalizeSummary) {
        if records.is_empty() {
            warn!("no market data to process");
            return (Vec::new(), NormalizeSummary::default());
        }

        let mut rows = Vec::with_capacity(records.len());
        let mut skipped = 0;

        for (index, record) in records.iter().enumerate() {
            match self.normalize_record(index, record, run_timestamp) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        index,
                        coin_id = record_id(record).unwrap_or("unknown"),
                        error = %e,
                        "skipping market record"
                    );
                }
            }
        }

        let summary = NormalizeSummary {
            received: records.len(),
            produced: rows.len(),
            skipped,
        };
        info!(
            received = summary.received,
            produced = summary.produced,
            skipped = summary.skipped,
            "processed data for {} cryptocurrencies",
            summary.produced
        );
        (rows, summary)
    }

    /// Normalize one record. `index` is its position in the batch, for logs.
    pub fn normalize_record(
        &self,
        index: usize,
        record: &RawMarketRecord,
        run_timestamp: DateTime<Utc>,
    ) -> Result<NormalizedRow, RecordError> {
        let obj = record
            .as_object()
            .ok_or(RecordError::NotAnObject(json_type(record)))?;
        let fields = Fields { obj, index };

        let coin_id = fields.string("id");
        if coin_id.is_none() {
            if self.require_coin_id {
                return Err(RecordError::MissingCoinId);
            }
            warn!(index, "record has no coin id; keeping row with empty coin_id");
        }

        Ok(NormalizedRow {
            timestamp: run_timestamp,
            coin_id,
            symbol: fields.string("symbol"),
            name: fields.string("name"),
            current_price: fields.number("current_price"),
            market_cap: fields.number("market_cap"),
            market_cap_rank: fields.rank("market_cap_rank"),
            total_volume: fields.number("total_volume"),
            price_change_24h: fields.number("price_change_24h"),
            price_change_percentage_24h: fields.number("price_change_percentage_24h"),
            market_cap_change_24h: fields.number("market_cap_change_24h"),
            market_cap_change_percentage_24h: fields.number("market_cap_change_percentage_24h"),
            circulating_supply: fields.number("circulating_supply"),
            total_supply: fields.number("total_supply"),
            max_supply: fields.number("max_supply"),
            last_updated: fields.string("last_updated"),
        })
    }
}

/// Normalize with the default (lenient) policy.
pub fn normalize(records: &[RawMarketRecord], run_timestamp: DateTime<Utc>) -> Vec<NormalizedRow> {
    Normalizer::default().normalize(records, run_timestamp)
}

// ─── Field extraction ────────────────────────────────────────────────

struct Fields<'a> {
    obj: &'a Map<String, Value>,
    index: usize,
}

impl Fields<'_> {
    /// `None` for a missing key or an explicit `null`.
    fn present(&self, key: &str) -> Option<&Value> {
        match self.obj.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.present(key)? {
            Value::String(s) => Some(s.clone()),
            other => self.wrong_type(key, other),
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        match self.present(key)? {
            Value::Number(n) => n.as_f64(),
            other => self.wrong_type(key, other),
        }
    }

    /// Ranks are whole numbers; `1.0` is accepted, `1.5` and negatives are not.
    fn rank(&self, key: &str) -> Option<u64> {
        let value = self.present(key)?;
        let rank = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            _ => None,
        };
        rank.or_else(|| self.wrong_type(key, value))
    }

    fn wrong_type<T>(&self, key: &str, found: &Value) -> Option<T> {
        debug!(
            index = self.index,
            field = key,
            found = json_type(found),
            "ignoring wrong-typed field"
        );
        None
    }
}

fn record_id(record: &RawMarketRecord) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn bitcoin() -> Value {
        json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 67000.5,
            "market_cap": 1_320_000_000_000u64,
            "market_cap_rank": 1,
            "total_volume": 25_000_000_000u64,
            "price_change_24h": -512.25,
            "price_change_percentage_24h": -0.76,
            "market_cap_change_24h": -10_000_000_000i64,
            "market_cap_change_percentage_24h": -0.75,
            "circulating_supply": 19_700_000.0,
            "total_supply": 21_000_000.0,
            "max_supply": 21_000_000.0,
            "last_updated": "2024-05-01T11:59:30.000Z",
            "image": "https://example.invalid/btc.png"
        })
    }

    #[test]
    fn well_formed_record_copies_every_field() {
        let rows = normalize(&[bitcoin()], ts());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row.timestamp, ts());
        assert_eq!(row.coin_id.as_deref(), Some("bitcoin"));
        assert_eq!(row.symbol.as_deref(), Some("btc"));
        assert_eq!(row.name.as_deref(), Some("Bitcoin"));
        assert_eq!(row.current_price, Some(67000.5));
        assert_eq!(row.market_cap, Some(1_320_000_000_000.0));
        assert_eq!(row.market_cap_rank, Some(1));
        assert_eq!(row.total_volume, Some(25_000_000_000.0));
        assert_eq!(row.price_change_24h, Some(-512.25));
        assert_eq!(row.price_change_percentage_24h, Some(-0.76));
        assert_eq!(row.market_cap_change_24h, Some(-10_000_000_000.0));
        assert_eq!(row.market_cap_change_percentage_24h, Some(-0.75));
        assert_eq!(row.circulating_supply, Some(19_700_000.0));
        assert_eq!(row.total_supply, Some(21_000_000.0));
        assert_eq!(row.max_supply, Some(21_000_000.0));
        assert_eq!(row.last_updated.as_deref(), Some("2024-05-01T11:59:30.000Z"));
    }

    #[test]
    fn missing_fields_are_absent_only() {
        let mut record = bitcoin();
        let obj = record.as_object_mut().unwrap();
        obj.remove("current_price");
        obj.remove("max_supply");
        obj.insert("total_supply".into(), Value::Null);

        let row = normalize(&[record], ts()).remove(0);
        assert_eq!(row.current_price, None);
        assert_eq!(row.max_supply, None);
        assert_eq!(row.total_supply, None);
        assert_eq!(row.market_cap, Some(1_320_000_000_000.0));
        assert_eq!(row.coin_id.as_deref(), Some("bitcoin"));
    }

    #[test]
    fn wrong_typed_fields_become_absent() {
        let mut record = bitcoin();
        let obj = record.as_object_mut().unwrap();
        obj.insert("current_price".into(), json!("67000.5"));
        obj.insert("symbol".into(), json!(42));
        obj.insert("market_cap_rank".into(), json!(1.5));

        let row = normalize(&[record], ts()).remove(0);
        assert_eq!(row.current_price, None);
        assert_eq!(row.symbol, None);
        assert_eq!(row.market_cap_rank, None);
        assert_eq!(row.name.as_deref(), Some("Bitcoin"));
    }

    /// Captures formatted log output for the duration of `f`.
    fn debug_log_of(f: impl FnOnce()) -> String {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        struct Sink(Arc<Mutex<Vec<u8>>>);

        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || Sink(writer.clone()))
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buf.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn rejected_rank_is_logged_like_other_wrong_types() {
        for bad in [json!(1.5), json!(-3)] {
            let mut record = bitcoin();
            record["market_cap_rank"] = bad;

            let mut rows = Vec::new();
            let log = debug_log_of(|| rows = normalize(&[record], ts()));

            assert_eq!(rows[0].market_cap_rank, None);
            assert!(log.contains("ignoring wrong-typed field"), "log: {log}");
            assert!(log.contains("market_cap_rank"), "log: {log}");
        }
    }

    #[test]
    fn integral_float_rank_is_accepted() {
        let mut record = bitcoin();
        record["market_cap_rank"] = json!(3.0);
        assert_eq!(normalize(&[record], ts())[0].market_cap_rank, Some(3));
    }

    #[test]
    fn non_object_records_are_skipped() {
        let records = vec![bitcoin(), json!("garbage"), json!([1, 2]), json!({"id": "ethereum"})];
        let (rows, summary) = Normalizer::default().normalize_with_summary(&records, ts());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].coin_id.as_deref(), Some("bitcoin"));
        assert_eq!(rows[1].coin_id.as_deref(), Some("ethereum"));
        assert_eq!(
            summary,
            NormalizeSummary {
                received: 4,
                produced: 2,
                skipped: 2
            }
        );
    }

    #[test]
    fn missing_coin_id_is_kept_by_default() {
        let mut record = bitcoin();
        record.as_object_mut().unwrap().remove("id");

        let rows = normalize(&[record], ts());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].coin_id, None);
        assert_eq!(rows[0].symbol.as_deref(), Some("btc"));
    }

    #[test]
    fn missing_coin_id_is_skipped_when_required() {
        let mut record = bitcoin();
        record.as_object_mut().unwrap().remove("id");

        let strict = Normalizer::new(&NormalizeConfig {
            require_coin_id: true,
        });
        assert_eq!(
            strict.normalize_record(0, &record, ts()),
            Err(RecordError::MissingCoinId)
        );
        assert!(strict.normalize(&[record, bitcoin()], ts()).len() == 1);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let (rows, summary) = Normalizer::default().normalize_with_summary(&[], ts());
        assert!(rows.is_empty());
        assert_eq!(summary, NormalizeSummary::default());
    }

    #[test]
    fn order_is_preserved_and_timestamp_shared() {
        let records: Vec<Value> = ["solana", "bitcoin", "cardano"]
            .iter()
            .map(|id| json!({ "id": id }))
            .collect();

        let rows = normalize(&records, ts());
        let ids: Vec<_> = rows.iter().map(|r| r.coin_id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["solana", "bitcoin", "cardano"]);
        assert!(rows.iter().all(|r| r.timestamp == ts()));
    }
}
