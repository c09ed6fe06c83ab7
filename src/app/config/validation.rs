use super::{ConfigError, ExporterConfig, MIN_DURATION_SECS};
use std::time::Duration;
use url::Url;

impl ExporterConfig {
    /// Reject settings no exporter could start with. Pure; no I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let url = Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Unsupported scheme '{}' in endpoint URL '{}'",
                url.scheme(),
                self.url
            )));
        }

        let min = Duration::from_secs(MIN_DURATION_SECS);
        if self.write_timeout < min {
            return Err(ConfigError::WriteTimeoutTooShort(self.write_timeout));
        }
        if self.interval < min {
            return Err(ConfigError::IntervalTooShort(self.interval));
        }

        match (&self.cert_file, &self.key_file) {
            (Some(_), None) => {
                return Err(ConfigError::InvalidConfig(
                    "metrics-exporter.client-cert-file is set without metrics-exporter.client-key-file"
                        .to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidConfig(
                    "metrics-exporter.client-key-file is set without metrics-exporter.client-cert-file"
                        .to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}
