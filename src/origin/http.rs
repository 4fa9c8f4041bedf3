//! HTTP API for an origin
//!
//! - `POST /api/v1.0/origin-api/directorTest` (bearer token required)
//! - `GET  /health`
//! - `GET  /metrics`

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::common::auth_middleware::{bearer_auth_middleware, AuthState};
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, HealthRegistry, HealthStatus, Metrics};
use crate::origin::heartbeat::{HeartbeatDeadlineMonitor, HeartbeatReport, DIRECTOR_COMPONENT};

pub const API_PREFIX: &str = "/api/v1.0/origin-api";

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
pub struct OriginState {
    pub monitor: Arc<HeartbeatDeadlineMonitor>,
    pub health: Arc<HealthRegistry>,
    pub metrics: Arc<Metrics>,
}

impl OriginState {
    /// Build the origin state with the director component in its startup
    /// `Warning` state. The watchdog is not started.
    pub fn new(window: std::time::Duration) -> Self {
        let health = Arc::new(HealthRegistry::new());
        let metrics = Arc::new(Metrics::new());
        health.set(
            DIRECTOR_COMPONENT,
            HealthStatus::Warning,
            "Initializing origin, unknown status for director",
        );
        let monitor = Arc::new(HeartbeatDeadlineMonitor::new(
            DIRECTOR_COMPONENT,
            window,
            health.clone(),
            metrics.clone(),
        ));
        Self {
            monitor,
            health,
            metrics,
        }
    }
}

pub fn create_router(state: OriginState, auth: AuthState) -> Router {
    let api = Router::new()
        .route("/directorTest", post(director_test))
        .route_layer(middleware::from_fn_with_state(auth, bearer_auth_middleware));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

/// Any authenticated report re-arms the watchdog, even one that fails to
/// decode.
async fn director_test(State(state): State<OriginState>, body: Bytes) -> Result<Response, Error> {
    let report: HeartbeatReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            state.monitor.touch();
            state.metrics.heartbeats.invalid.inc();
            tracing::error!(error = %e, "Invalid director test response");
            return Err(Error::Validation("Invalid director test response".into()));
        }
    };

    if let Err(e) = state.monitor.signal(&report) {
        tracing::error!(status = %report.status, "Invalid director test response status");
        return Err(e);
    }
    Ok(Json(json!({ "status": "success", "msg": "success" })).into_response())
}

async fn health(State(state): State<OriginState>) -> impl IntoResponse {
    let components = state.health.snapshot();
    let overall = components
        .values()
        .map(|r| r.status)
        .max_by_key(|s| s.as_gauge())
        .unwrap_or_default();
    Json(json!({
        "status": overall,
        "version": env!("CARGO_PKG_VERSION"),
        "liveness": state.monitor.liveness(),
        "components": components,
    }))
}

async fn metrics(State(state): State<OriginState>) -> impl IntoResponse {
    let mut out = state.metrics.to_prometheus();
    out += &state.health.to_prometheus();
    (StatusCode::OK, out)
}
