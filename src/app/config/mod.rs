mod cli;
pub mod serde_helpers;
mod validation;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lower bound shared by the collection interval and the write timeout.
pub const MIN_DURATION_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("metrics-exporter.url must be non-empty")]
    EmptyEndpoint,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("metrics-exporter.write-timeout must be at least {MIN_DURATION_SECS}s (got {0:?})")]
    WriteTimeoutTooShort(Duration),
    #[error("metrics-exporter.interval must be at least {MIN_DURATION_SECS}s (got {0:?})")]
    IntervalTooShort(Duration),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

pub use cli::ExporterConfig;
