//! coinsnap CLI: fetch, ping and validate commands.
//!
//! Commands:
//! - `fetch`: run one fetch → normalize → persist cycle
//! - `ping`: check that the market data API is reachable
//! - `validate`: check a persisted artifact (default: the newest one)
//!
//! Exit codes: 0 success, 1 the command ran and failed, 2 setup failure
//! (configuration, logging, HTTP client construction).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use coinsnap_core::config::DEFAULT_CONFIG_PATH;
use coinsnap_core::logging::{self, LoggingHandle};
use coinsnap_core::validate::latest_artifact;
use coinsnap_core::{
    validate_artifact, AppConfig, ArtifactReport, CoinGeckoClient, Pipeline, RunOutcome,
};

#[derive(Parser)]
#[command(
    name = "coinsnap",
    about = "Cryptocurrency market snapshot fetcher"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch market data for the tracked coins and save it as a CSV artifact.
    Fetch {
        /// Output directory. Overrides `output.dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check connectivity to the market data API.
    Ping,
    /// Validate an artifact's schema and content.
    Validate {
        /// Artifact to validate. Defaults to the newest one in the output directory.
        path: Option<PathBuf>,

        /// Output directory to search. Overrides `output.dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

/// What a command reported, once setup succeeded.
enum Status {
    Ok,
    Failed,
}

const EXIT_FAILED: u8 = 1;
const EXIT_SETUP: u8 = 2;

fn main() -> ExitCode {
    ExitCode::from(run(Cli::parse()))
}

/// Run one command and return the process exit code.
fn run(cli: Cli) -> u8 {
    let (config, logging) = match init(&cli.config) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error initializing crypto data fetcher: {e:#}");
            return EXIT_SETUP;
        }
    };

    let config_path = cli.config;
    let outcome = logging.in_scope(|| {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            config = %config_path.display(),
            "crypto data fetcher initialized"
        );
        dispatch(cli.command, config)
    });

    match outcome {
        Ok(Status::Ok) => 0,
        Ok(Status::Failed) => EXIT_FAILED,
        Err(e) => {
            eprintln!("Error initializing crypto data fetcher: {e:#}");
            EXIT_SETUP
        }
    }
}

fn init(config_path: &Path) -> Result<(AppConfig, LoggingHandle)> {
    let config = AppConfig::from_file(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let logging = logging::init(&config.logging).context("setting up logging")?;
    Ok((config, logging))
}

fn dispatch(command: Commands, mut config: AppConfig) -> Result<Status> {
    match command {
        Commands::Fetch { output_dir } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            run_fetch(&config)
        }
        Commands::Ping => run_ping(&config),
        Commands::Validate { path, output_dir } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            run_validate(&config, path)
        }
    }
}

fn run_fetch(config: &AppConfig) -> Result<Status> {
    let client =
        CoinGeckoClient::new(&config.api.coingecko).context("building market data client")?;
    let pipeline = Pipeline::from_config(client, config)?;

    match pipeline.run() {
        RunOutcome::Succeeded { artifact, rows } => {
            println!("Crypto data fetch completed successfully!");
            println!("Saved {rows} rows to {}", artifact.display());
            Ok(Status::Ok)
        }
        RunOutcome::Failed { stage, .. } => {
            println!("Crypto data fetch failed at {stage} stage. Check logs for details.");
            Ok(Status::Failed)
        }
    }
}

fn run_ping(config: &AppConfig) -> Result<Status> {
    let client =
        CoinGeckoClient::new(&config.api.coingecko).context("building market data client")?;

    match client.ping() {
        Ok(()) => {
            println!("API connection successful");
            Ok(Status::Ok)
        }
        Err(e) => {
            println!("API connection failed: {e}");
            Ok(Status::Failed)
        }
    }
}

fn run_validate(config: &AppConfig, path: Option<PathBuf>) -> Result<Status> {
    let path = match path {
        Some(p) => p,
        None => match latest_artifact(&config.output.dir) {
            Ok(Some(p)) => p,
            Ok(None) => {
                println!("No artifacts found in {}", config.output.dir.display());
                return Ok(Status::Failed);
            }
            Err(e) => {
                println!("{e}");
                return Ok(Status::Failed);
            }
        },
    };

    match check_artifact(config, &path) {
        Ok(report) => {
            print_report(&report);
            Ok(Status::Ok)
        }
        Err(e) => {
            println!("Artifact {} is invalid: {e:#}", path.display());
            Ok(Status::Failed)
        }
    }
}

/// Validate `path`, counting coverage against the same trimmed coin set a fetch requests.
fn check_artifact(config: &AppConfig, path: &Path) -> Result<ArtifactReport> {
    let coins = config.tracked_coins()?;
    Ok(validate_artifact(path, coins.as_slice())?)
}

fn print_report(report: &ArtifactReport) {
    println!();
    println!("=== Artifact ===");
    println!("Path:           {}", report.path.display());
    println!("Rows:           {}", report.rows);
    println!(
        "Tracked coins:  {}/{} found",
        report.expected_found, report.expected_total
    );
    if !report.extra_columns.is_empty() {
        println!("Extra columns:  {}", report.extra_columns.join(", "));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinsnap_core::data::COLUMNS;
    use std::fs;
    use std::net::TcpListener;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("coinsnap").chain(args.iter().copied())).unwrap()
    }

    fn refused_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/api/v3")
    }

    /// Writes `config.toml` under `dir` with output going to `dir/raw`.
    fn write_config(dir: &Path, base_url: &str, coins: &str) -> PathBuf {
        let toml = format!(
            r#"
[api.coingecko]
base_url = "{base_url}"
timeout_secs = 5
rate_limit_per_minute = 60000

[cryptocurrencies]
tracked_coins = [{coins}]

[output]
dir = '{}'
"#,
            dir.join("raw").display()
        );
        let path = dir.join("config.toml");
        fs::write(&path, toml).unwrap();
        path
    }

    fn write_artifact(dir: &Path) -> PathBuf {
        let raw = dir.join("raw");
        fs::create_dir_all(&raw).unwrap();
        let path = raw.join("crypto_market_data_20240501_120000.csv");
        let row = "2024-05-01T12:00:00.000000Z,bitcoin,btc,Bitcoin,67000.5,1320000000000,1,25000000000,,,,,,,,";
        fs::write(&path, format!("{}\n{row}\n", COLUMNS.join(","))).unwrap();
        path
    }

    #[test]
    fn missing_config_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("nope.toml");

        let code = run(cli(&["--config", config.to_str().unwrap(), "fetch"]));
        assert_eq!(code, EXIT_SETUP);
    }

    #[test]
    fn invalid_config_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "http://127.0.0.1:1/api/v3", "");

        let code = run(cli(&["--config", config.to_str().unwrap(), "ping"]));
        assert_eq!(code, EXIT_SETUP);
    }

    #[test]
    fn fetch_against_refused_port_is_run_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &refused_base_url(), r#""bitcoin""#);

        let code = run(cli(&["--config", config.to_str().unwrap(), "fetch"]));
        assert_eq!(code, EXIT_FAILED);
        assert!(!dir.path().join("raw").exists());
    }

    #[test]
    fn ping_against_refused_port_is_run_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &refused_base_url(), r#""bitcoin""#);

        let code = run(cli(&["--config", config.to_str().unwrap(), "ping"]));
        assert_eq!(code, EXIT_FAILED);
    }

    #[test]
    fn validate_with_no_artifacts_is_run_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &refused_base_url(), r#""bitcoin""#);
        fs::create_dir_all(dir.path().join("raw")).unwrap();

        let code = run(cli(&["--config", config.to_str().unwrap(), "validate"]));
        assert_eq!(code, EXIT_FAILED);
    }

    #[test]
    fn validate_latest_artifact_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &refused_base_url(), r#""bitcoin""#);
        write_artifact(dir.path());

        let code = run(cli(&["--config", config.to_str().unwrap(), "validate"]));
        assert_eq!(code, 0);
    }

    #[test]
    fn validate_counts_coins_after_trimming() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), &refused_base_url(), r#"" bitcoin""#);
        let artifact = write_artifact(dir.path());
        let config = AppConfig::from_file(&config_path).unwrap();

        let report = check_artifact(&config, &artifact).unwrap();
        assert_eq!(report.expected_found, 1);
        assert_eq!(report.expected_total, 1);
    }
}
