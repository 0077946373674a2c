//! Request instrumentation middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics::RequestMetrics;

/// Label for a request method. Extension methods share one label so the
/// label set stays bounded.
pub fn operation_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

/// Records count, in-flight and latency per method around the inner service.
pub async fn track_requests(
    State(metrics): State<Arc<RequestMetrics>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let operation = operation_label(request.method());
    let started = Instant::now();
    let in_flight = metrics.begin();

    let response = next.run(request).await;

    drop(in_flight);
    metrics.record(operation, started.elapsed());
    response
}
