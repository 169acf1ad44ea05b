// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request-id tagging and access logging, grounded on the daemon
//! middleware this crate descends from.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// The correlation id for one request, threaded through as a request
/// extension so handlers and error responses can read it back.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Generate (or adopt a client-supplied) request id, stash it as a request
/// extension, and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    req.extensions_mut().insert(RequestId(id));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Structured access log, one `info!` per completed request.
pub async fn access_log_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        target: "titan.http",
        http.method = %method,
        http.path = %path,
        http.status = status,
        http.duration_ms = duration_ms,
        "request complete"
    );
    response
}
