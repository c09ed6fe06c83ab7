use bytes::Bytes;
use remote_metrics_exporter::sender::{
    DeliveryError, Label, RemoteClient, RemoteClientConfig, Sample, TimeSeries, WriteRequest,
    decode_write_request, encode_write_request,
};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn payload() -> Bytes {
    let request = WriteRequest {
        timeseries: vec![TimeSeries {
            labels: vec![Label::new("__name__", "up"), Label::new("client_id", "abc")],
            samples: vec![Sample {
                value: 1.0,
                timestamp: 1_700_000_000_000,
            }],
        }],
    };
    encode_write_request(&request).unwrap()
}

fn client(server: &MockServer, bearer: Option<&str>) -> RemoteClient {
    let config = RemoteClientConfig::new(
        format!("{}/api/v1/write", server.uri()),
        Duration::from_secs(5),
    );
    RemoteClient::new(config, bearer).unwrap()
}

#[tokio::test]
async fn test_store_sends_remote_write_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/write"))
        .and(header("content-encoding", "snappy"))
        .and(header("content-type", "application/x-protobuf"))
        .and(header("user-agent", "metrics-exporter"))
        .and(header("x-prometheus-remote-write-version", "0.1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, None);
    client.store(payload()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));

    let decoded = decode_write_request(&requests[0].body).unwrap();
    assert_eq!(decoded.timeseries.len(), 1);
    assert_eq!(decoded.timeseries[0].metric_name(), Some("up"));

    let stats = client.stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn test_store_presents_license_as_jwt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "JWT header.claims.signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, Some("header.claims.signature"));
    client.store(payload()).await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("ingester unavailable\nstack trace follows"),
        )
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None)
        .store(payload())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    match err {
        DeliveryError::ServerError {
            status,
            body_excerpt,
        } => {
            assert_eq!(status, 503);
            assert_eq!(body_excerpt, "ingester unavailable");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_is_not_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("out of order sample"))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, None);
    let err = client.store(payload()).await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.status(), Some(400));
    assert!(matches!(err, DeliveryError::ClientError { ref body_excerpt, .. } if body_excerpt == "out of order sample"));
    assert_eq!(client.stats().failures, 1);
}

#[tokio::test]
async fn test_error_excerpt_is_truncated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(4096)))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None)
        .store(payload())
        .await
        .unwrap_err();

    match err {
        DeliveryError::ServerError { body_excerpt, .. } => assert_eq!(body_excerpt.len(), 256),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let config = RemoteClientConfig::new(mock_server.uri(), Duration::from_millis(200));
    let client = RemoteClient::new(config, None).unwrap();

    let err = client.store(payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(ref e) if e.is_timeout()));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = RemoteClientConfig::new(format!("http://{addr}/write"), Duration::from_secs(2));
    let client = RemoteClient::new(config, None).unwrap();

    let err = client.store(payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
    assert_eq!(client.stats().failures, 1);
}
