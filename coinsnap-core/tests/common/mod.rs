//! Shared helpers: a one-shot local HTTP server, config builders and
//! realistic market records.

#![allow(dead_code)]

use coinsnap_core::AppConfig;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::JoinHandle;

/// Serves exactly one canned HTTP response, then closes.
pub struct OneShotServer {
    pub base_url: String,
    handle: JoinHandle<String>,
}

impl OneShotServer {
    /// `status` is the status line tail, e.g. `"200 OK"`.
    pub fn serve(status: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                let n = reader.read_line(&mut header).unwrap();
                if n == 0 || header == "\r\n" {
                    break;
                }
            }

            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request_line.trim_end().to_string()
        });

        Self {
            base_url: format!("http://{addr}/api/v3"),
            handle,
        }
    }

    /// Wait for the exchange to finish and return the request line it saw.
    pub fn request_line(self) -> String {
        self.handle.join().unwrap()
    }
}

/// Base URL of a port that nothing listens on.
pub fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/v3")
}

/// Config pointing at `base_url`, writing under `out`, with a near-zero throttle.
pub fn config(base_url: &str, coins: &[&str], out: &Path) -> AppConfig {
    config_with_rate(base_url, coins, out, 60_000)
}

pub fn config_with_rate(base_url: &str, coins: &[&str], out: &Path, rate: u32) -> AppConfig {
    let ids = coins
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
[api.coingecko]
base_url = "{base_url}"
timeout_secs = 5
rate_limit_per_minute = {rate}

[cryptocurrencies]
tracked_coins = [{ids}]

[output]
dir = '{}'
"#,
        out.display()
    );
    AppConfig::from_toml(&toml).unwrap()
}

/// A complete `coins/markets` entry.
pub fn market_record(id: &str, symbol: &str, price: f64, rank: u64) -> Value {
    json!({
        "id": id,
        "symbol": symbol,
        "name": id.to_uppercase(),
        "image": format!("https://example.invalid/{id}.png"),
        "current_price": price,
        "market_cap": price * 1_000_000.0,
        "market_cap_rank": rank,
        "fully_diluted_valuation": null,
        "total_volume": price * 10_000.0,
        "high_24h": price * 1.02,
        "low_24h": price * 0.98,
        "price_change_24h": -1.25,
        "price_change_percentage_24h": -0.5,
        "market_cap_change_24h": -12_500.0,
        "market_cap_change_percentage_24h": -0.5,
        "circulating_supply": 19_700_000.0,
        "total_supply": 21_000_000.0,
        "max_supply": 21_000_000.0,
        "last_updated": "2024-05-01T11:59:30.000Z"
    })
}

pub fn three_records() -> Vec<Value> {
    vec![
        market_record("bitcoin", "btc", 67_000.5, 1),
        market_record("ethereum", "eth", 3_100.25, 2),
        market_record("solana", "sol", 145.0, 5),
    ]
}

/// Names of every entry in `dir`, sorted. Empty when `dir` does not exist.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
