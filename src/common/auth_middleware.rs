//! Bearer authentication middleware for axum
//!
//! Rejects requests before they reach a handler, so a rejected request never
//! mutates state.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::common::auth::TokenVerifier;

const BEARER_PREFIX: &str = "Bearer ";

/// State for auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

fn unauthorized(message: String) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Validates `Authorization: Bearer <token>` against the configured verifier
pub async fn bearer_auth_middleware(
    State(state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => value,
        None => return unauthorized("Authorization header is missing".to_string()),
    };

    let header = match header.to_str() {
        Ok(h) => h,
        Err(_) => return unauthorized("Authorization header is not valid ASCII".to_string()),
    };

    let token = match header.strip_prefix(BEARER_PREFIX) {
        Some(t) => t.trim(),
        None => return unauthorized("Authorization header is not Bearer type".to_string()),
    };

    match state.verifier.verify(token) {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!(path = %request.uri().path(), "Can't validate Bearer token");
            unauthorized("Can't validate Bearer token".to_string())
        }
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Error when verifying Bearer token");
            unauthorized(format!("Error when verifying Bearer token: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, Result};
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<bool> {
            match token {
                "good" => Ok(true),
                "bad" => Ok(false),
                _ => Err(Error::Auth("malformed".into())),
            }
        }
    }

    fn app() -> Router {
        let state = AuthState::new(Arc::new(StaticVerifier));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, bearer_auth_middleware))
    }

    async fn status_with(header: Option<&str>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let resp = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        resp.status()
    }

    #[tokio::test]
    async fn test_bearer_outcomes() {
        assert_eq!(status_with(None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Basic Zm9vOmJhcg==")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Bearer bad")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Bearer ???")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Bearer good")).await, StatusCode::OK);
    }
}
