use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{observability::SpanStatus, state::AppState};

/// Wrap the request in an `http.request` span. The response passes through unchanged.
pub async fn request_span_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let mut span = state
        .observability
        .start_span("http.request", &[("method", method.as_str()), ("path", path.as_str())]);
    tracing::debug!(trace_id = span.trace_id(), %method, %path, "Request started");

    let response = next.run(request).await;

    let status = response.status();
    span.set_attribute("status", status.as_str());
    span.set_tag("status_code", f64::from(status.as_u16()));

    // Only 5xx marks the span as failed.
    if status.is_server_error() {
        state
            .observability
            .finish_span(span, SpanStatus::Error, Some(status.to_string()));
    } else {
        state
            .observability
            .finish_span(span, SpanStatus::Success, None);
    }

    response
}
