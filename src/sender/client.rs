use super::codec::{CONTENT_ENCODING, CONTENT_TYPE, PROTOCOL_VERSION};
use super::tls::{TlsError, TlsSettings};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Response};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const USER_AGENT: &str = "metrics-exporter";
pub const PROTOCOL_VERSION_HEADER: &str = "x-prometheus-remote-write-version";

/// Longest prefix of an error response body kept for diagnostics.
pub const MAX_ERR_MSG_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Outcome of a single failed `store` call. None of these are fatal: the
/// writer logs them and tries again on its next tick.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server returned HTTP status {status}: {body_excerpt}")]
    ServerError { status: u16, body_excerpt: String },
    #[error("remote storage rejected the batch with HTTP status {status}: {body_excerpt}")]
    ClientError { status: u16, body_excerpt: String },
}

impl DeliveryError {
    /// Whether sending the same data again could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ServerError { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::ServerError { status, .. } | Self::ClientError { status, .. } => Some(*status),
        }
    }
}

/// Something a [`crate::exporter::RemoteWriter`] can hand encoded batches to.
pub trait Transport: Send + Sync + 'static {
    fn store(&self, payload: Bytes) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub url: String,
    pub timeout: Duration,
    pub tls: TlsSettings,
    /// Sent with every request. An `Authorization` entry here takes
    /// precedence over the bearer credential.
    pub headers: HeaderMap,
}

impl RemoteClientConfig {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            tls: TlsSettings::default(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    bytes_sent: AtomicU64,
}

impl DeliveryStats {
    fn record_attempt(&self, bytes: usize) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_outcome(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Remote-write client for a single endpoint.
///
/// Cheap to clone; clones share the connection pool and the stats.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    url: Url,
    timeout: Duration,
    headers: HeaderMap,
    stats: Arc<DeliveryStats>,
}

impl RemoteClient {
    pub fn new(config: RemoteClientConfig, bearer: Option<&str>) -> Result<Self, ClientError> {
        let url = Url::parse(&config.url).map_err(|e| {
            ClientError::InvalidConfiguration(format!("Invalid endpoint URL '{}': {}", config.url, e))
        })?;

        let mut builder = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2);

        if let Some(tls) = config.tls.build_client_config()? {
            builder = builder.use_preconfigured_tls(tls);
        }

        let client = builder.build()?;
        let headers = Self::build_headers(config.headers, bearer)?;

        Ok(Self {
            client,
            url,
            timeout: config.timeout,
            headers,
            stats: Arc::new(DeliveryStats::default()),
        })
    }

    fn build_headers(extra: HeaderMap, bearer: Option<&str>) -> Result<HeaderMap, ClientError> {
        let mut headers = extra;
        headers.insert(
            header::CONTENT_ENCODING,
            HeaderValue::from_static(CONTENT_ENCODING),
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
            HeaderValue::from_static(PROTOCOL_VERSION),
        );

        if let Some(token) = bearer.filter(|t| !t.is_empty())
            && !headers.contains_key(header::AUTHORIZATION)
        {
            let mut value = HeaderValue::from_str(&format!("JWT {token}")).map_err(|e| {
                ClientError::InvalidConfiguration(format!("License is not a valid header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        Ok(headers)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// POST one encoded batch. Never retries; the response body is always
    /// consumed so the connection can go back to the pool.
    pub async fn store(&self, payload: Bytes) -> Result<(), DeliveryError> {
        let bytes = payload.len();
        let start = Instant::now();
        self.stats.record_attempt(bytes);

        let result = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_outcome(false);
                return Err(DeliveryError::Transport(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            drain(response).await;
            self.stats.record_outcome(true);
            debug!(
                status = status.as_u16(),
                bytes,
                latency_ms = start.elapsed().as_millis() as u64,
                "Batch delivered"
            );
            return Ok(());
        }

        let body_excerpt = read_excerpt(response).await;
        self.stats.record_outcome(false);

        let status = status.as_u16();
        if (500..600).contains(&status) {
            Err(DeliveryError::ServerError {
                status,
                body_excerpt,
            })
        } else {
            Err(DeliveryError::ClientError {
                status,
                body_excerpt,
            })
        }
    }
}

impl Transport for RemoteClient {
    async fn store(&self, payload: Bytes) -> Result<(), DeliveryError> {
        RemoteClient::store(self, payload).await
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

async fn drain(mut response: Response) {
    while let Ok(Some(_)) = response.chunk().await {}
}

/// First line of at most [`MAX_ERR_MSG_LEN`] bytes of the body; the rest is
/// read and discarded.
async fn read_excerpt(mut response: Response) -> String {
    let mut buf = Vec::with_capacity(MAX_ERR_MSG_LEN);
    while let Ok(Some(chunk)) = response.chunk().await {
        let room = MAX_ERR_MSG_LEN - buf.len();
        if room > 0 {
            buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_include_protocol_markers() {
        let headers = RemoteClient::build_headers(HeaderMap::new(), None).unwrap();
        assert_eq!(headers[header::CONTENT_ENCODING], "snappy");
        assert_eq!(headers[header::CONTENT_TYPE], "application/x-protobuf");
        assert_eq!(headers[header::USER_AGENT], "metrics-exporter");
        assert_eq!(headers[PROTOCOL_VERSION_HEADER], "0.1.0");
        assert!(!headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_bearer_sets_jwt_authorization() {
        let headers = RemoteClient::build_headers(HeaderMap::new(), Some("a.b.c")).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "JWT a.b.c");
        assert!(headers[header::AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_empty_bearer_is_ignored() {
        let headers = RemoteClient::build_headers(HeaderMap::new(), Some("")).unwrap();
        assert!(!headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_existing_authorization_wins() {
        let mut extra = HeaderMap::new();
        extra.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        let headers = RemoteClient::build_headers(extra, Some("a.b.c")).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Basic Zm9vOmJhcg==");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RemoteClientConfig::new("not a url", Duration::from_secs(5));
        assert!(matches!(
            RemoteClient::new(config, None),
            Err(ClientError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_retryable_classification() {
        let server = DeliveryError::ServerError {
            status: 503,
            body_excerpt: String::new(),
        };
        let client = DeliveryError::ClientError {
            status: 400,
            body_excerpt: "bad".to_string(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert_eq!(server.status(), Some(503));
        assert_eq!(client.status(), Some(400));
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DeliveryStats::default();
        stats.record_attempt(10);
        stats.record_outcome(true);
        stats.record_attempt(5);
        stats.record_outcome(false);
        assert_eq!(
            stats.snapshot(),
            DeliverySnapshot {
                attempts: 2,
                successes: 1,
                failures: 1,
                bytes_sent: 15,
            }
        );
    }
}
