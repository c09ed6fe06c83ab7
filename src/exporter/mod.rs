pub mod convert;
pub mod labels;
pub mod writer;

pub use convert::to_write_request;
pub use labels::{CLIENT_ID_LABEL, ExtraLabels};
pub use writer::{RemoteWriter, TickError, TickReport, WriterHandle, WriterState};

use crate::app::ExporterConfig;
use crate::collector::{HealthCollector, TestMetricsCollector};
use crate::identity::Identity;
use crate::sender::{ClientError, RemoteClient, RemoteClientConfig, TlsSettings};
use prometheus::Registry;
use prometheus::core::Collector;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("failed to build remote client: {0}")]
    Client(#[from] ClientError),
    #[error("collection interval must be greater than zero")]
    InvalidInterval,
}

/// Delivery settings an exporter takes from the validated configuration.
#[derive(Debug, Clone)]
pub struct ExporterSettings {
    pub url: String,
    pub interval: Duration,
    pub write_timeout: Duration,
    pub tls: TlsSettings,
}

impl From<&ExporterConfig> for ExporterSettings {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            url: config.url.clone(),
            interval: config.interval,
            write_timeout: config.write_timeout,
            tls: config.tls_settings(),
        }
    }
}

/// One registry plus the writer that ships it.
pub struct MetricsExporter {
    settings: ExporterSettings,
    identity: Identity,
    registry: Registry,
}

impl MetricsExporter {
    /// Registers the default collectors (health, and test metrics when the
    /// identity is known) into `registry`, or into a fresh one.
    pub fn new(
        settings: impl Into<ExporterSettings>,
        identity: Identity,
        registry: Option<Registry>,
    ) -> Result<Self, ExporterError> {
        let registry = registry.unwrap_or_default();
        registry.register(Box::new(HealthCollector::new()?))?;

        if identity.is_empty() {
            warn!("Exporter identity is empty, test metrics collector not registered");
        } else {
            registry.register(Box::new(TestMetricsCollector::new(identity.client_id())?))?;
        }

        Ok(Self {
            settings: settings.into(),
            identity,
            registry,
        })
    }

    pub fn register<C: Collector + 'static>(&self, collector: C) -> Result<(), ExporterError> {
        self.registry.register(Box::new(collector))?;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn remote_client(&self) -> Result<RemoteClient, ExporterError> {
        let config = RemoteClientConfig::new(self.settings.url.clone(), self.settings.write_timeout)
            .with_tls(self.settings.tls.clone());
        Ok(RemoteClient::new(config, self.identity.bearer())?)
    }

    /// Builds the remote client and starts the periodic writer. Returns as
    /// soon as the writer task is spawned.
    pub fn run(
        self,
        token: CancellationToken,
        extra_labels: ExtraLabels,
    ) -> Result<WriterHandle, ExporterError> {
        let client = self.remote_client()?;

        let mut labels = extra_labels;
        labels.set(CLIENT_ID_LABEL, self.identity.client_id());

        info!(
            url = %client.url(),
            timeout_secs = client.timeout().as_secs(),
            client_id = self.identity.client_id(),
            "Starting metrics exporter"
        );

        let writer = RemoteWriter::new(client, self.registry, self.settings.interval, labels)?;
        Ok(writer.run(token))
    }
}
