//! Event intake for domain collaborators.
//!
//! Stands in for the process and task engines: an accepted event is fanned out
//! to subscribers in the background and the caller never waits on delivery.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::webhook::{EmitEventRequest, WebhookEvent},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub event: String,
    pub accepted: bool,
}

/// Emit an event for the caller's tenant.
///
/// # Response (202 Accepted)
///
/// ```json
/// { "event": "task.created", "accepted": true }
/// ```
pub async fn emit_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<EmitEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.event.trim().is_empty() {
        return Err(AppError::InvalidRequest("event must not be empty".to_string()));
    }

    let event = WebhookEvent::new(request.event, auth.tenant_id, request.data);
    let name = event.event.clone();

    // Delivery outcomes are reported through logs and metrics only.
    drop(state.dispatcher.emit_detached(event));

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            event: name,
            accepted: true,
        }),
    ))
}
