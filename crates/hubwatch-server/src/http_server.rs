//! Operational HTTP endpoints: metrics, liveness and on-demand discovery.

use crate::metrics::MetricsRegistry;
use crate::monitor::HealthMonitor;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use discovery::{DiscoveryError, DiscoveryService};
use prometheus_client::encoding::text::encode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub metrics: Arc<MetricsRegistry>,
    pub discovery: Arc<DiscoveryService>,
    pub monitor: Arc<HealthMonitor>,
    /// Listen window used when a discover request names none
    pub default_window: Duration,
}

/// HTTP server for the operational endpoints
pub struct ApiServer {
    state: ApiState,
    listen_addr: String,
}

#[derive(Debug, Deserialize)]
struct DiscoverParams {
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

impl ApiServer {
    pub fn new(state: ApiState, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(
        self,
        shutdown: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/discover", post(discover_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Handler for /metrics endpoint
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &state.metrics.registry) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}

async fn healthz_handler(State(state): State<ApiState>) -> Response {
    let monitor_running = state.monitor.is_running().await;
    Json(json!({
        "status": "ok",
        "monitor_running": monitor_running,
    }))
    .into_response()
}

async fn discover_handler(
    State(state): State<ApiState>,
    Query(params): Query<DiscoverParams>,
) -> Response {
    let window = params.timeout.unwrap_or(state.default_window);

    match state.discovery.discover(window).await {
        Ok(candidates) => {
            state.metrics.record_discovery(candidates.len());
            Json(candidates).into_response()
        }
        Err(e @ DiscoveryError::InvalidTimeout(_)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Discovery failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
