use crate::collector::AlertGauge;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AlertRequest {
    pub value: i64,
}

pub fn router(gauge: AlertGauge) -> Router {
    Router::new()
        .route("/alert", post(alert_handler))
        .route("/healthz", get(health_handler))
        .with_state(gauge)
}

/// Handler for POST /alert
async fn alert_handler(State(gauge): State<AlertGauge>, body: Bytes) -> (StatusCode, String) {
    match serde_json::from_slice::<AlertRequest>(&body) {
        Ok(request) => {
            gauge.set(request.value);
            info!(value = request.value, "Alert gauge updated");
            (StatusCode::OK, format!("new value {}", request.value))
        }
        Err(e) => {
            warn!(error = %e, "Rejected alert request");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

/// Handler for GET /healthz
async fn health_handler() -> &'static str {
    "ok"
}

/// Serve the alert router until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    gauge: AlertGauge,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!("Alert server listening on {}", listener.local_addr()?);
    info!("  - POST /alert    (set alert_test gauge)");
    info!("  - GET  /healthz  (health check)");

    axum::serve(listener, router(gauge))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
