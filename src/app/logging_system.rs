use super::config::LogLevel;
use parking_lot::{Mutex, RwLock};
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_FORMAT_ENV: &str = "RUST_LOG_FORMAT";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to build filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install global subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    target: String,
    level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

/// Collects per-target directives and installs the global subscriber.
#[derive(Debug, Default)]
pub struct LoggingSystem {
    directives: RwLock<Vec<LogDirective>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quiet the HTTP and TLS stacks below `warn`.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "reqwest", "h2", "rustls", "tower"] {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        std::iter::once(default_level.as_str().to_string())
            .chain(directives.iter().map(LogDirective::to_filter_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `RUST_LOG`, when set, takes precedence over the built filter.
    pub fn build_filter(&self, default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let filter = self.build_filter_string(default_level);
        EnvFilter::try_new(&filter).map_err(|source| LoggingError::Filter { filter, source })
    }

    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let filter = self.build_filter(default_level)?;
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().flatten_event(true).with_current_span(true))
                .try_init(),
            LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        };
        result.map_err(|e| LoggingError::Install(e.to_string()))
    }
}

/// Installs the global subscriber once per process; later calls return the
/// outcome of the first.
pub fn setup_logging_safe(level: LogLevel) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    static INIT_ERROR: Mutex<Option<String>> = Mutex::new(None);

    INIT.call_once(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        if let Err(e) = logging_system.initialize_tracing(level, LogFormat::from_env()) {
            *INIT_ERROR.lock() = Some(e.to_string());
        }
    });

    match INIT_ERROR.lock().as_ref() {
        Some(e) => Err(LoggingError::Install(e.clone())),
        None => Ok(()),
    }
}
