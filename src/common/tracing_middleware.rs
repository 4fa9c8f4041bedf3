//! Request tracing middleware
//!
//! Every request runs inside an `http_request` span carrying an `X-Request-ID`
//! (the caller's, or a fresh uuid) which is echoed on the response. One line
//! is logged on completion; its level follows the response status.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::Next,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn request_id_of(request: &Request<Body>) -> String {
    match request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_request_id(),
    }
}

fn log_completion(status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16();
    let duration_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        error!(status = status_code, duration_ms, "request failed");
    } else if status.is_client_error() {
        warn!(status = status_code, duration_ms, "request rejected");
    } else {
        info!(status = status_code, duration_ms, "request completed");
    }
}

/// Tags the request with an ID, runs it inside a span and logs the outcome.
///
/// Client address is optional so routers served without connect info (and
/// in-process tests) still pass through.
pub async fn request_tracing_middleware(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let started = Instant::now();
    let request_id = request_id_of(&request);
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        client = %client,
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| log_completion(response.status(), started.elapsed()));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_tracing_middleware))
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let req = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app().oneshot(req).await.unwrap();
        let id = resp.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
