//! HTTP handlers for webhook subscription management.
//!
//! This module provides API endpoints for tenants to register, list, and
//! deactivate subscriptions that receive signed domain events.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::webhook::{WebhookSubscriptionRequest, WebhookSubscriptionResponse};
use crate::state::AppState;

/// Register a new webhook subscription.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/webhook",
///   "events": ["process.completed", "task.created"]
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the subscription details.
/// The `secret` is only returned once during creation.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "url": "https://example.com/webhook",
///   "events": ["process.completed", "task.created"],
///   "secret": "a1b2c3d4e5f6...",
///   "is_active": true,
///   "created_at": "2025-01-15T10:30:00Z"
/// }
/// ```
///
/// # Security
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - Secret is 64-character hex string for HMAC-SHA256 unless supplied
pub async fn create_webhook(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<WebhookSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state.dispatcher.register(auth.tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// List active webhook subscriptions of the caller's tenant.
///
/// Secrets are never returned in list operations.
pub async fn list_webhooks(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<WebhookSubscriptionResponse>>, AppError> {
    let subscriptions = state.dispatcher.list(auth.tenant_id).await?;

    Ok(Json(subscriptions))
}

/// Deactivate a webhook subscription (soft delete).
///
/// # Response
///
/// Returns 204 No Content on success, 404 if the subscription does not exist,
/// belongs to another tenant, or is already inactive.
pub async fn delete_webhook(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subscription_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .dispatcher
        .deactivate(auth.tenant_id, subscription_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
