pub mod alert;
pub mod config;
pub mod logging_system;
pub mod shutdown;

pub use config::{ConfigError, ExporterConfig, LogLevel};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging_safe};
pub use shutdown::{cancel_on_signal, shutdown_signal};

use crate::collector::{AlertGauge, IdentityCollector};
use crate::exporter::{ExporterError, ExtraLabels, MetricsExporter, WriterHandle};
use crate::identity::{Identity, LicenseFormatError};
use std::net::SocketAddr;
use std::process;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid license: {0}")]
    License(#[from] LicenseFormatError),
    #[error("Exporter error: {0}")]
    Exporter(#[from] ExporterError),
    #[error("Failed to bind alert server to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Alert server failed: {0}")]
    AlertServer(#[source] std::io::Error),
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// The whole agent: one exporter per shard plus the alert endpoint.
pub struct App {
    config: ExporterConfig,
    identity: Identity,
    alert_gauge: AlertGauge,
    exporters: Vec<MetricsExporter>,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = ExporterConfig::from_args(args)?;
        Self::from_config(config)
    }

    /// Validates `config`, resolves the identity once and builds every shard.
    /// Nothing is sent until [`App::run`].
    pub fn from_config(mut config: ExporterConfig) -> Result<Self, AppError> {
        config.post_process();
        config.validate()?;

        let identity = Identity::resolve(config.configured_id(), config.license.as_deref())?;
        if identity.is_empty() {
            warn!("Neither an exporter id nor a license is configured; series carry no client_id");
        }

        let alert_gauge = AlertGauge::new().map_err(ExporterError::from)?;
        let exporters = (0..config.parallel)
            .map(|_| {
                let exporter = MetricsExporter::new(&config, identity.clone(), None)?;
                exporter.register(alert_gauge.clone())?;
                exporter.register(IdentityCollector::new(identity.client_id())?)?;
                #[cfg(target_os = "linux")]
                exporter.register(prometheus::process_collector::ProcessCollector::for_self())?;
                Ok(exporter)
            })
            .collect::<Result<Vec<_>, ExporterError>>()?;

        info!(
            url = %config.url,
            interval = ?config.interval,
            write_timeout = ?config.write_timeout,
            parallel = config.parallel,
            client_id = identity.client_id(),
            "Configuration loaded"
        );

        Ok(Self {
            config,
            identity,
            alert_gauge,
            exporters,
        })
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn alert_gauge(&self) -> &AlertGauge {
        &self.alert_gauge
    }

    pub fn exporters(&self) -> &[MetricsExporter] {
        &self.exporters
    }

    /// Runs until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), AppError> {
        let shutdown = CancellationToken::new();
        let signal_listener = cancel_on_signal(shutdown.clone());
        let result = self.run_until(shutdown).await;
        signal_listener.abort();
        result
    }

    /// Starts every writer and the alert server, then waits for `shutdown`
    /// (or an alert server failure) and joins the writers.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let address = self.config.alert_addr;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| AppError::Bind { address, source })?;

        let gauge = self.alert_gauge.clone();
        let handles = self.start_writers(&shutdown)?;
        info!(writers = handles.len(), "metrics-exporter is running. Press Ctrl+C to stop.");

        let server = alert::serve(listener, gauge, shutdown.clone()).await;
        let result = match server {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Alert server failed: {}", e);
                Err(AppError::AlertServer(e))
            }
        };

        shutdown.cancel();
        for handle in handles {
            if let Err(e) = handle.join().await {
                error!("Writer task failed: {}", e);
            }
        }

        info!("metrics-exporter stopped.");
        result
    }

    fn start_writers(self, shutdown: &CancellationToken) -> Result<Vec<WriterHandle>, AppError> {
        let pod = ExtraLabels::from_env();
        self.exporters
            .into_iter()
            .enumerate()
            .map(|(index, exporter)| {
                let mut labels = ExtraLabels::shard(index + 1);
                labels.extend(pod.clone());
                Ok(exporter.run(shutdown.child_token(), labels)?)
            })
            .collect()
    }
}

pub fn get_version() -> String {
    crate::VERSION.to_string()
}

// Main entry point for the application
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("metrics-exporter {}", get_version());
        return Ok(());
    }

    let config = match ExporterConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            let _ = setup_logging_safe(LogLevel::default());
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    setup_logging_safe(config.log_level)?;
    info!("Starting metrics-exporter v{}", get_version());

    match App::from_config(config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Startup error: {}", e);
            process::exit(1);
        }
    }

    Ok(())
}
