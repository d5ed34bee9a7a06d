//! Metric export endpoints.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// In-process metric snapshot, keyed by `name{tag=value,...}`.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<BTreeMap<String, f64>> {
    Json(state.observability.metrics_snapshot())
}

/// Prometheus text exposition. 404 unless the recorder was installed at startup.
pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
