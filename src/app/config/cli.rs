use super::serde_helpers::{deserialize_duration, deserialize_non_empty, non_empty, parse_duration};
use super::{ConfigError, LogLevel};
use crate::sender::TlsSettings;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_ALERT_ADDR: &str = "0.0.0.0:8080";

#[derive(Parser, Clone, Deserialize)]
#[command(
    name = "metrics-exporter",
    author,
    version,
    about = "Prometheus metrics writer",
    long_about = None
)]
#[serde(default)]
pub struct ExporterConfig {
    /// The id for metrics exporter
    #[arg(long = "metrics-exporter.id", env = "METRICS_EXPORTER_ID")]
    #[serde(deserialize_with = "deserialize_non_empty")]
    pub id: Option<String>,

    /// The address of metrics storage where metrics data will be sent
    #[arg(
        long = "metrics-exporter.url",
        env = "METRICS_EXPORTER_URL",
        default_value = ""
    )]
    pub url: String,

    /// Interval at which metrics data will be sent (e.g. 30s, 2m; bare numbers are seconds)
    #[arg(
        long = "metrics-exporter.interval",
        env = "METRICS_EXPORTER_INTERVAL",
        default_value = "30s",
        value_parser = parse_duration
    )]
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,

    /// Metrics write timeout (e.g. 10s, 3m; bare numbers are seconds)
    #[arg(
        long = "metrics-exporter.write-timeout",
        env = "METRICS_EXPORTER_WRITE_TIMEOUT",
        default_value = "3m",
        value_parser = parse_duration
    )]
    #[serde(deserialize_with = "deserialize_duration")]
    pub write_timeout: Duration,

    /// The path of the CA cert to use for the remote metric storage
    #[arg(long = "metrics-exporter.ca-cert-file", env = "METRICS_EXPORTER_CA_CERT_FILE")]
    pub ca_file: Option<PathBuf>,

    /// The path of the client cert to use for communicating with the remote metric storage
    #[arg(
        long = "metrics-exporter.client-cert-file",
        env = "METRICS_EXPORTER_CLIENT_CERT_FILE"
    )]
    pub cert_file: Option<PathBuf>,

    /// The path of the client key to use for communicating with the remote metric storage
    #[arg(
        long = "metrics-exporter.client-key-file",
        env = "METRICS_EXPORTER_CLIENT_KEY_FILE"
    )]
    pub key_file: Option<PathBuf>,

    /// The server name which will be used to verify metrics storage
    #[arg(long = "metrics-exporter.server-name", env = "METRICS_EXPORTER_SERVER_NAME")]
    #[serde(deserialize_with = "deserialize_non_empty")]
    pub server_name: Option<String>,

    /// Skip tls verification when communicating with the remote metric storage
    #[arg(
        long = "metrics-exporter.insecure-skip-verify",
        env = "METRICS_EXPORTER_INSECURE_SKIP_VERIFY"
    )]
    pub insecure_skip_verify: bool,

    /// License to use for authentication
    #[arg(
        long = "metrics-exporter.license",
        env = "METRICS_EXPORTER_LICENSE",
        hide_env_values = true
    )]
    #[serde(deserialize_with = "deserialize_non_empty")]
    pub license: Option<String>,

    /// Number of exporters running in parallel, each with its own shard label
    #[arg(long = "nums-of-parallel-req", env = "NUMS_OF_PARALLEL_REQ", default_value_t = 1)]
    pub parallel: usize,

    /// Listen address of the alert test endpoint
    #[arg(long, env = "ALERT_ADDR", default_value = DEFAULT_ALERT_ADDR)]
    pub alert_addr: SocketAddr,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            id: None,
            url: String::new(),
            interval: DEFAULT_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ca_file: None,
            cert_file: None,
            key_file: None,
            server_name: None,
            insecure_skip_verify: false,
            license: None,
            parallel: 1,
            alert_addr: default_alert_addr(),
            log_level: LogLevel::Info,
            config_file: None,
        }
    }
}

fn default_alert_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl std::fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("interval", &self.interval)
            .field("write_timeout", &self.write_timeout)
            .field("ca_file", &self.ca_file)
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("server_name", &self.server_name)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("license", &self.license.as_ref().map(|_| "<redacted>"))
            .field("parallel", &self.parallel)
            .field("alert_addr", &self.alert_addr)
            .field("log_level", &self.log_level)
            .field("config_file", &self.config_file)
            .finish()
    }
}

impl ExporterConfig {
    /// Parse CLI arguments (clap also reads the `env` fallbacks), layer them
    /// over the optional config file, then validate.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().get_matches_from(args);
        let mut config = Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        if let Some(path) = config.config_file.clone() {
            let base = Self::load_file(&path)?;
            config.merge_over(base, &matches);
        }

        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path.as_ref())?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ExporterConfig = toml::from_str(content)?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Keep every value given on the command line or through its env var;
    /// take `base` for the ones clap filled in from a default.
    fn merge_over(&mut self, base: ExporterConfig, matches: &ArgMatches) {
        let file_wins = |id: &str| {
            matches
                .value_source(id)
                .is_none_or(|source| source == ValueSource::DefaultValue)
        };

        if file_wins("id") {
            self.id = base.id;
        }
        if file_wins("url") {
            self.url = base.url;
        }
        if file_wins("interval") {
            self.interval = base.interval;
        }
        if file_wins("write_timeout") {
            self.write_timeout = base.write_timeout;
        }
        if file_wins("ca_file") {
            self.ca_file = base.ca_file;
        }
        if file_wins("cert_file") {
            self.cert_file = base.cert_file;
        }
        if file_wins("key_file") {
            self.key_file = base.key_file;
        }
        if file_wins("server_name") {
            self.server_name = base.server_name;
        }
        if file_wins("insecure_skip_verify") {
            self.insecure_skip_verify = base.insecure_skip_verify;
        }
        if file_wins("license") {
            self.license = base.license;
        }
        if file_wins("parallel") {
            self.parallel = base.parallel;
        }
        if file_wins("alert_addr") {
            self.alert_addr = base.alert_addr;
        }
        if file_wins("log_level") {
            self.log_level = base.log_level;
        }
    }

    pub fn post_process(&mut self) {
        self.id = non_empty(self.id.take());
        self.server_name = non_empty(self.server_name.take());
        self.license = non_empty(self.license.take());

        if self.parallel < 1 {
            self.parallel = 1;
        }
    }

    pub fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            ca_file: self.ca_file.clone(),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            server_name: self.server_name.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
        }
    }

    pub fn configured_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}
