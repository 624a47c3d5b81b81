//! src/logging.rs
//! ============================================================================
//! # Logging: structured JSON logs through `tracing`
//!
//! Installs a global `tracing-subscriber` registry writing JSON lines to a
//! rolling file via a non-blocking `tracing-appender` writer. `RUST_LOG`
//! directives are layered on top of the configured level.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::Directive, layer::SubscriberExt, util::SubscriberInitExt,
};

static LOGGING_INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Self::NEVER,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("fsb"),
            log_level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),
}

pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.log_level = CompactString::new(level);
        self
    }

    /// Install the global subscriber. Keep the guard alive until exit, logs
    /// buffered in the writer are flushed when it drops.
    pub fn build(self) -> Result<WorkerGuard> {
        if LOGGING_INSTALLED.load(Ordering::SeqCst) {
            return Err(LoggingError::AlreadyInitialized.into());
        }

        std::fs::create_dir_all(&self.config.log_dir).map_err(LoggingError::from)?;

        let appender: RollingFileAppender = RollingFileAppender::new(
            self.config.rotation.into(),
            &self.config.log_dir,
            self.config.log_file_prefix.as_str(),
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let directive: Directive = Directive::from_str(&self.config.log_level)
            .context("Invalid log level in config")?;
        let filter: EnvFilter = EnvFilter::from_default_env().add_directive(directive);

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_names(true)
            .with_writer(writer)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(json_layer)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        // Only a successful install counts; failed attempts may be retried.
        LOGGING_INSTALLED.store(true, Ordering::SeqCst);

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Logger;

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Install logging from the application config.
    pub fn init(config: &LoggerConfig) -> Result<WorkerGuard> {
        LoggerBuilder::new().with_config(config.clone()).build()
    }
}
