//! Run orchestrator: fetch → normalize → persist.
//!
//! Stages run strictly in sequence with no retries between them. Every stage
//! error is caught here, logged with the stage name, and folded into a single
//! `RunOutcome`. Callers never see partial results.

use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::artifact::ArtifactWriter;
use crate::config::{AppConfig, ConfigError};
use crate::data::normalize::Normalizer;
use crate::data::provider::{MarketDataSource, TrackedCoins};

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Normalize,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded { artifact: PathBuf, rows: usize },
    Failed { stage: Stage, reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            RunOutcome::Succeeded { artifact, .. } => Some(artifact),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            RunOutcome::Succeeded { .. } => None,
            RunOutcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// One configured fetch-normalize-persist pipeline.
pub struct Pipeline<S> {
    source: S,
    coins: TrackedCoins,
    normalizer: Normalizer,
    writer: ArtifactWriter,
}

impl<S: MarketDataSource> Pipeline<S> {
    pub fn new(source: S, coins: TrackedCoins, normalizer: Normalizer, writer: ArtifactWriter) -> Self {
        Self {
            source,
            coins,
            normalizer,
            writer,
        }
    }

    /// Wire a pipeline from application config around `source`.
    pub fn from_config(source: S, config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            source,
            config.tracked_coins()?,
            Normalizer::new(&config.normalize),
            ArtifactWriter::new(&config.output.dir),
        ))
    }

    /// Execute one run to a terminal state.
    pub fn run(&self) -> RunOutcome {
        info!(
            source = self.source.name(),
            coins = self.coins.len(),
            "starting crypto data fetch and save process"
        );

        let records = match self.source.fetch_market_data(&self.coins) {
            Ok(records) => records,
            Err(e) => return fail(Stage::Fetch, e.to_string()),
        };
        info!(stage = %Stage::Fetch, records = records.len(), "stage complete");
        if records.is_empty() {
            warn!(stage = %Stage::Fetch, "upstream returned an empty payload");
        }

        let run_timestamp = Utc::now();
        let (rows, summary) = self.normalizer.normalize_with_summary(&records, run_timestamp);
        drop(records);
        if rows.is_empty() {
            return fail(
                Stage::Normalize,
                format!("no rows produced from {} records", summary.received),
            );
        }
        info!(
            stage = %Stage::Normalize,
            rows = summary.produced,
            skipped = summary.skipped,
            "stage complete"
        );

        match self.writer.persist(&rows) {
            Ok(artifact) => {
                info!(
                    stage = %Stage::Persist,
                    path = %artifact.display(),
                    rows = rows.len(),
                    "successfully completed data fetch and save"
                );
                RunOutcome::Succeeded {
                    artifact,
                    rows: rows.len(),
                }
            }
            Err(e) => fail(Stage::Persist, e.to_string()),
        }
    }
}

fn fail(stage: Stage, reason: String) -> RunOutcome {
    error!(stage = %stage, reason = %reason, "run failed");
    RunOutcome::Failed { stage, reason }
}
