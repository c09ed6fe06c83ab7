pub mod license;

pub use license::{LicenseClaims, LicenseFormatError, decode_unverified, subject_unverified};

use tracing::{info, warn};

/// Process identity attached to every outgoing series, plus the bearer
/// credential the transport presents.
///
/// Resolved once at startup and never mutated afterwards; clone it into each
/// exporter that needs it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Identity {
    client_id: String,
    bearer: Option<String>,
}

impl Identity {
    /// Identity taken verbatim from configuration, no bearer credential.
    pub fn from_configured(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            bearer: None,
        }
    }

    /// Resolve the identity from the configured id and optional license.
    ///
    /// With a license, its subject replaces the configured id and the raw
    /// token becomes the bearer credential. The subject is read without
    /// signature verification; treat it as a label, not as proof of who the
    /// caller is.
    pub fn resolve(configured_id: &str, license: Option<&str>) -> Result<Self, LicenseFormatError> {
        let Some(token) = license.map(str::trim).filter(|t| !t.is_empty()) else {
            warn!("license is not provided");
            return Ok(Self::from_configured(configured_id));
        };

        let subject = subject_unverified(token)?;
        if subject.is_empty() {
            warn!(configured_id, "License carries no subject; client id is empty");
        } else if !configured_id.is_empty() && configured_id != subject {
            info!(
                configured_id,
                client_id = %subject,
                "Overwriting client id from license"
            );
        } else {
            info!(client_id = %subject, "Client id taken from license");
        }

        Ok(Self {
            client_id: subject,
            bearer: Some(token.to_string()),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_empty()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("client_id", &self.client_id)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
