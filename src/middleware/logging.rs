//! Request logging middleware.
//!
//! One log line per request: method, path, status, latency and a request id
//! that is also echoed back in the `x-request-id` response header.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Path polled by load balancers; not worth a log line per probe
const HEALTH_PATH: &str = "/api/health";

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if status.is_server_error() {
        warn!(%request_id, %method, %path, status = status.as_u16(), latency_ms, "Request failed");
    } else {
        info!(%request_id, %method, %path, status = status.as_u16(), latency_ms, "Request completed");
    }

    response
}
