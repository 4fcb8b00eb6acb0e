//! Logging initialization
//!
//! `RUST_LOG` wins over the configured level. Output goes to stderr, or to
//! `[logging].file` when set, so it never mixes with command output.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Filter from `RUST_LOG`, else `level`, else `warn`
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level);

    let writer = match &config.file {
        Some(file) => {
            let path = PathBuf::from(file);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| LoggingError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggingError::Io { path, source })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()?;
    }

    Ok(())
}
