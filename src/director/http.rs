//! HTTP API for the director
//!
//! Routes live under `/api/v1.0/director_ui`:
//! - `GET    /servers?server_type=origin|cache`
//! - `PATCH  /servers?serverUrl=<url>` with `{"disabled": bool}`
//! - `GET    /servers/origins/stat/*path?min_responses=&max_responses=` (HEAD too)
//! - `GET    /contact`
//!
//! plus `/health` and `/metrics` at the root. When bearer auth is configured
//! the toggle and stat routes require a token.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, MethodRouter},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::common::auth_middleware::{bearer_auth_middleware, AuthState};
use crate::common::config::SupportContact;
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{normalize_object_path, DirectorConfig, Error, HealthRegistry, Metrics};
use crate::director::advertisement::AdvertisementSource;
use crate::director::listing::{FederationListingAssembler, ServerTypeFilter};
use crate::director::overrides::ServerOverrideRegistry;
use crate::director::stat::{ObjectAvailabilityQuery, QueryStatus, StatProbe};

pub const API_PREFIX: &str = "/api/v1.0/director_ui";

const MAX_BODY_BYTES: usize = 64 * 1024;

const PUBLIC_NAMESPACE_HINT: &str =
    "If no object is available, please check if the object is in a public namespace.";

#[derive(Clone)]
pub struct DirectorState {
    pub listing: Arc<FederationListingAssembler>,
    pub overrides: Arc<ServerOverrideRegistry>,
    pub query: Arc<ObjectAvailabilityQuery>,
    pub health: Arc<HealthRegistry>,
    pub metrics: Arc<Metrics>,
    pub contact: SupportContact,
}

impl DirectorState {
    pub fn new(
        config: &DirectorConfig,
        advertisements: Arc<dyn AdvertisementSource>,
        health: Arc<HealthRegistry>,
        probe: Arc<dyn StatProbe>,
    ) -> Self {
        let overrides = Arc::new(ServerOverrideRegistry::new(
            config.filtered_servers.iter().cloned(),
        ));
        let metrics = Arc::new(Metrics::new());
        let listing = Arc::new(FederationListingAssembler::new(
            advertisements.clone(),
            overrides.clone(),
            health.clone(),
        ));
        let query = Arc::new(ObjectAvailabilityQuery::new(
            advertisements,
            overrides.clone(),
            probe,
            config.stat,
            metrics.clone(),
        ));
        Self {
            listing,
            overrides,
            query,
            health,
            metrics,
            contact: config.support_contact.clone(),
        }
    }
}

fn gated(route: MethodRouter<DirectorState>, auth: &Option<AuthState>) -> MethodRouter<DirectorState> {
    match auth {
        Some(auth) => route.route_layer(middleware::from_fn_with_state(
            auth.clone(),
            bearer_auth_middleware,
        )),
        None => route,
    }
}

pub fn create_router(state: DirectorState, auth: Option<AuthState>) -> Router {
    // GET routes answer HEAD as well.
    let api = Router::new()
        .route(
            "/servers",
            get(list_servers).merge(gated(patch(toggle_server), &auth)),
        )
        .route(
            "/servers/origins/stat/*path",
            gated(get(query_origins), &auth),
        )
        .route("/contact", get(contact));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListServersQuery {
    server_type: Option<String>,
}

async fn list_servers(
    State(state): State<DirectorState>,
    Query(query): Query<ListServersQuery>,
) -> Result<Response, Error> {
    let filter = ServerTypeFilter::parse(query.server_type.as_deref())?;
    let views = state.listing.list(filter);
    Ok(Json(views).into_response())
}

#[derive(Debug, Deserialize)]
struct ToggleQuery {
    #[serde(rename = "serverUrl")]
    server_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    disabled: bool,
}

async fn toggle_server(
    State(state): State<DirectorState>,
    Query(query): Query<ToggleQuery>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let server_url = match query.server_url {
        Some(url) if !url.is_empty() => url,
        _ => {
            return Err(Error::Validation(
                "'serverUrl' is a required query parameter".into(),
            ))
        }
    };
    let Json(request) = body.map_err(|e| {
        Error::Validation(format!("Invalid request body: {}", e.body_text()))
    })?;

    match state.overrides.toggle(&server_url, request.disabled) {
        Ok(_) => {
            state.metrics.toggles_applied.inc();
            Ok(Json(json!({ "status": "success", "msg": "success" })).into_response())
        }
        Err(e) => {
            if matches!(e, Error::Conflict { .. }) {
                state.metrics.toggles_conflict.inc();
            }
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatQuery {
    min_responses: Option<usize>,
    max_responses: Option<usize>,
}

async fn query_origins(
    State(state): State<DirectorState>,
    Path(raw_path): Path<String>,
    params: Result<Query<StatQuery>, QueryRejection>,
) -> Result<Response, Error> {
    let path = normalize_object_path(&format!("/{}", raw_path))?;
    let Query(params) = params.map_err(|_| Error::Validation("Invalid query parameters".into()))?;
    let (min_responses, max_responses) = match (params.min_responses, params.max_responses) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            state.metrics.queries.invalid.inc();
            return Err(Error::InvalidParameter(
                "min_responses and max_responses are required".into(),
            ));
        }
    };

    match state.query.query(&path, min_responses, max_responses).await {
        Ok(outcome) => {
            let ok = outcome.status == QueryStatus::Satisfied;
            Ok(Json(json!({
                "ok": ok,
                "message": outcome.message,
                "metadata": outcome.metadata,
            }))
            .into_response())
        }
        Err(Error::NotFound(msg)) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "msg": format!("{} {}", msg, PUBLIC_NAMESPACE_HINT),
            })),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

async fn contact(State(state): State<DirectorState>) -> impl IntoResponse {
    Json(json!({
        "email": state.contact.email,
        "url": state.contact.url,
    }))
}

async fn health(State(state): State<DirectorState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.metrics.uptime_seconds(),
        "servers": state.health.snapshot(),
    }))
}

async fn metrics(State(state): State<DirectorState>) -> impl IntoResponse {
    let mut out = state.metrics.to_prometheus();
    out += &state.health.to_prometheus();
    (StatusCode::OK, out)
}
