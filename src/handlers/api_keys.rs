//! API key management endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::api_key::{ApiKeyResponse, IssueApiKeyRequest, IssuedApiKeyResponse},
    state::AppState,
};

/// Issue a new API key for the caller's tenant.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "ci-pipeline",
///   "scopes": ["process:start"]
/// }
/// ```
///
/// # Response
///
/// 201 Created. `secret` appears in this response only and cannot be retrieved later.
pub async fn issue_api_key(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<IssueApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }

    let (secret, key) = state
        .registry
        .issue(auth.tenant_id, request.scopes, name.to_string())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssuedApiKeyResponse {
            secret,
            key: key.into(),
        }),
    ))
}

/// List active keys of the caller's tenant. Hashes and secrets are never returned.
pub async fn list_api_keys(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.registry.list(auth.tenant_id).await?;

    Ok(Json(keys))
}

/// Revoke a key of the caller's tenant.
///
/// # Response
///
/// 204 No Content when revoked; 404 when the key is unknown, owned by another
/// tenant, or already revoked.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.registry.revoke(key_id, auth.tenant_id).await? {
        return Err(AppError::NotFound("API key"));
    }

    Ok(StatusCode::NO_CONTENT)
}
