//! Read-back checks for persisted artifacts.
//!
//! Used by the `validate` command to confirm that a run produced something a
//! downstream consumer can actually use: all schema columns, at least one
//! row, populated key numeric columns and a parseable run timestamp.

use chrono::DateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::artifact::parse_artifact_file_name;
use crate::data::schema::{COLUMNS, KEY_NUMERIC_COLUMNS};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to read artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to list artifacts in {}: {source}", path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {} has no data rows", path.display())]
    Empty { path: PathBuf },

    #[error("missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column {0} has no valid data")]
    NoData(String),

    #[error("invalid timestamp '{value}': {message}")]
    BadTimestamp { value: String, message: String },
}

/// What a valid artifact contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactReport {
    pub path: PathBuf,
    pub rows: usize,
    /// Columns present in the file but not part of the schema.
    pub extra_columns: Vec<String>,
    /// Distinct non-empty `coin_id` values, in first-seen order.
    pub coins_found: Vec<String>,
    /// How many of the expected coins appear in `coins_found`.
    pub expected_found: usize,
    pub expected_total: usize,
}

/// Validate the artifact at `path`. `expected_coins` only feeds the coverage
/// counts in the report; missing coins are not an error.
pub fn validate_artifact(
    path: &Path,
    expected_coins: &[String],
) -> Result<ArtifactReport, ValidationError> {
    let read_err = |source| ValidationError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(read_err)?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(read_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }
    let extra_columns: Vec<String> = headers
        .iter()
        .filter(|h| !COLUMNS.contains(&h.as_str()))
        .cloned()
        .collect();

    let records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    if records.is_empty() {
        return Err(ValidationError::Empty {
            path: path.to_path_buf(),
        });
    }

    let column = |name: &str| headers.iter().position(|h| h == name);

    for name in KEY_NUMERIC_COLUMNS {
        let Some(idx) = column(name) else { continue };
        let populated = records.iter().any(|r| {
            r.get(idx)
                .is_some_and(|v| !v.is_empty() && v.parse::<f64>().is_ok())
        });
        if !populated {
            return Err(ValidationError::NoData(name.to_string()));
        }
    }

    if let Some(idx) = column("timestamp") {
        let value = records[0].get(idx).unwrap_or_default();
        DateTime::parse_from_rfc3339(value).map_err(|e| ValidationError::BadTimestamp {
            value: value.to_string(),
            message: e.to_string(),
        })?;
    }

    let mut coins_found = Vec::new();
    if let Some(idx) = column("coin_id") {
        let mut seen = HashSet::new();
        for r in &records {
            if let Some(id) = r.get(idx).filter(|v| !v.is_empty()) {
                if seen.insert(id.to_string()) {
                    coins_found.push(id.to_string());
                }
            }
        }
    }
    let expected_found = expected_coins
        .iter()
        .filter(|c| coins_found.contains(c))
        .count();

    let report = ArtifactReport {
        path: path.to_path_buf(),
        rows: records.len(),
        extra_columns,
        coins_found,
        expected_found,
        expected_total: expected_coins.len(),
    };
    info!(
        path = %path.display(),
        rows = report.rows,
        expected_found = report.expected_found,
        expected_total = report.expected_total,
        "artifact validated"
    );
    Ok(report)
}

/// Newest artifact in `dir`, by the timestamp and sequence in its filename.
///
/// Returns `Ok(None)` when the directory does not exist or holds no artifacts.
pub fn latest_artifact(dir: &Path) -> Result<Option<PathBuf>, ValidationError> {
    if !dir.exists() {
        return Ok(None);
    }
    let list_err = |source| ValidationError::ListDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut best = None;
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let name = entry.file_name();
        let Some(key) = name.to_str().and_then(parse_artifact_file_name) else {
            continue;
        };
        if best.as_ref().map_or(true, |(k, _)| key > *k) {
            best = Some((key, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}
