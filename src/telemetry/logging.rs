//! Subscriber setup for the queue's tracing output.
//!
//! Worker threads carry their configured names, so every event records
//! which worker emitted it.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How events are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `render_queue=debug`.
    pub level: String,
    /// Append to this file instead of stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "render_queue=info".to_string(),
            output_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
    #[error("unknown log format: {0}")]
    UnknownFormat(String),
    #[error("cannot open log file {path}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global subscriber. Call once, before the queue starts.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| LogError::InvalidFilter {
        directive: config.level.clone(),
        reason: e.to_string(),
    })?;
    let writer = match &config.output_path {
        Some(path) => file_writer(path)?,
        None => BoxMakeWriter::new(io::stderr),
    };

    let layer = fmt::layer().with_thread_names(true).with_writer(writer);
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
    };
    installed.map_err(|_| LogError::AlreadyInitialized)
}

fn file_writer(path: &Path) -> Result<BoxMakeWriter, LogError> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::FileOpen { path: path.to_path_buf(), source })?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}
