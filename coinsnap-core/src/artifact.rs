//! Artifact writer: one timestamped CSV file per run.
//!
//! Layout: `{dir}/crypto_market_data_{YYYYMMDD_HHMMSS}.csv` (UTC).
//!
//! - Atomic: rows go to a temporary file in `dir`, which is synced and then
//!   moved into place with a no-clobber rename. A failed or killed write never
//!   leaves a file under the final name.
//! - Unique: if the name is taken (two runs in the same second), a sequence
//!   suffix is appended: `..._HHMMSS_1.csv`, `..._HHMMSS_2.csv`, ...
//! - Append-only: existing artifacts are never touched.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::schema::{NormalizedRow, COLUMNS};

/// Filename prefix shared by every artifact.
pub const FILE_PREFIX: &str = "crypto_market_data_";

/// Timestamp pattern embedded in artifact filenames.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Upper bound on sequence suffixes tried for one second.
const MAX_SEQUENCE: u32 = 1000;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("no rows to write")]
    NothingToWrite,

    #[error("artifact I/O failure: {0}")]
    Io(String),
}

fn io_failure(action: &str, path: &Path, e: impl std::fmt::Display) -> WriteError {
    WriteError::Io(format!("{action} {}: {e}", path.display()))
}

/// Writes run datasets under a fixed directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `rows` as a new artifact named after the current UTC time.
    pub fn persist(&self, rows: &[NormalizedRow]) -> Result<PathBuf, WriteError> {
        self.persist_at(rows, Utc::now())
    }

    /// Persist `rows` as a new artifact named after `now`.
    pub fn persist_at(
        &self,
        rows: &[NormalizedRow],
        now: DateTime<Utc>,
    ) -> Result<PathBuf, WriteError> {
        if rows.is_empty() {
            warn!("no data to save");
            return Err(WriteError::NothingToWrite);
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| io_failure("failed to create directory", &self.dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".crypto_market_data_")
            .suffix(".csv.tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| io_failure("failed to create temp file in", &self.dir, e))?;

        write_csv(tmp.as_file_mut(), rows)
            .map_err(|e| io_failure("failed to write", tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| io_failure("failed to sync", tmp.path(), e))?;

        for seq in 0..MAX_SEQUENCE {
            let path = self.dir.join(artifact_file_name(now, seq));
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    info!(path = %path.display(), rows = rows.len(), "data saved");
                    return Ok(path);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                }
                Err(e) => return Err(io_failure("failed to move artifact into", &path, e.error)),
            }
        }

        Err(WriteError::Io(format!(
            "no free artifact name for {} after {MAX_SEQUENCE} attempts",
            now.format(STAMP_FORMAT)
        )))
    }
}

/// Artifact filename for `now`; `seq > 0` adds a collision suffix.
pub fn artifact_file_name(now: DateTime<Utc>, seq: u32) -> String {
    let stamp = now.format(STAMP_FORMAT);
    if seq == 0 {
        format!("{FILE_PREFIX}{stamp}.csv")
    } else {
        format!("{FILE_PREFIX}{stamp}_{seq}.csv")
    }
}

/// Parse an artifact filename back into its creation time and sequence number.
///
/// Returns `None` for anything that is not an artifact name.
pub fn parse_artifact_file_name(name: &str) -> Option<(NaiveDateTime, u32)> {
    let rest = name.strip_prefix(FILE_PREFIX)?.strip_suffix(".csv")?;
    // YYYYMMDD_HHMMSS is 15 chars; anything after is `_{seq}`.
    if rest.len() < 15 || !rest.is_char_boundary(15) {
        return None;
    }
    let (stamp, suffix) = rest.split_at(15);
    let created = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    let seq = match suffix {
        "" => 0,
        s => s.strip_prefix('_')?.parse::<u32>().ok().filter(|n| *n > 0)?,
    };
    Some((created, seq))
}

/// Write the header and one record per row.
pub fn write_csv<W: Write>(writer: W, rows: &[NormalizedRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record(row.to_record())?;
    }
    wtr.flush()?;
    Ok(())
}
