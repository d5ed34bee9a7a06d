//! Per-key quota enforcement for API-key principals.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, Principal},
    services::rate_limiter::RateLimitDecision,
    state::AppState,
};

/// Count the request against its API key's window.
///
/// Session principals and unauthenticated requests are not limited here.
/// A denial short-circuits with 429 and `Retry-After`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limited_key = request
        .extensions()
        .get::<AuthContext>()
        .filter(|ctx| ctx.principal == Principal::Api)
        .and_then(|ctx| ctx.api_key_id);

    if let Some(key_id) = limited_key {
        let settings = state.rate_limit;
        if let RateLimitDecision::Denied { retry_after_secs } =
            state.limiter.allow(key_id, settings.requests, settings.window)
        {
            state
                .observability
                .record_metric("rate_limit.denied", 1.0, &[]);
            tracing::debug!(key_id = %key_id, retry_after_secs, "Rate limit exceeded");

            return Err(AppError::RateLimitExceeded { retry_after_secs });
        }
    }

    Ok(next.run(request).await)
}
