//! Logging setup.
//!
//! Builds a `tracing` dispatcher from `LoggingConfig`: a human-readable
//! stream on stderr, plus a plain-text file sink when `logging.file` is set.
//! The dispatcher is not installed globally. Callers run their work inside
//! `LoggingHandle::in_scope`, so tests and embedders can each bring their own.
//!
//! `RUST_LOG` overrides the configured level when set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

use crate::config::ConfigError;

/// Logging configuration (`[logging]` section).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive: a level (`info`) or a full `EnvFilter` string
    /// (`warn,coinsnap_core=debug`).
    #[serde(default = "default_level")]
    pub level: String,

    /// Optional log file. Parent directories are created on startup.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            ConfigError::Invalid(format!("logging.level '{}': {e}", self.level))
        })?;
        if let Some(file) = &self.file {
            if file.file_name().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "logging.file '{}' has no file name",
                    file.display()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    Filter { directive: String, message: String },

    #[error("invalid log file path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}

/// A constructed logging pipeline.
///
/// Holds the file writer guard; dropping the handle flushes pending file output.
pub struct LoggingHandle {
    dispatch: Dispatch,
    _guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    /// Run `f` with this handle's dispatcher as the current default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Build the logging pipeline described by `config`.
pub fn init(config: &LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    let filter = build_filter(&config.level)?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let appender = open_log_file(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    Ok(LoggingHandle {
        dispatch: Dispatch::new(subscriber),
        _guard: guard,
    })
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let base = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::Filter {
            directive: level.to_string(),
            message: e.to_string(),
        })?,
    };

    let mut filter = base;
    for directive in ["hyper=warn", "reqwest=warn"] {
        let parsed = directive.parse().map_err(|e: tracing_subscriber::filter::ParseError| {
            LoggingError::Filter {
                directive: directive.to_string(),
                message: e.to_string(),
            }
        })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

fn open_log_file(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|e| LoggingError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(appender)
}
