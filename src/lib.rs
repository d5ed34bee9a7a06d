//! Tenant Integration Server
//!
//! Trust and integration layer of a multi-tenant workflow platform. It authenticates
//! machine callers by API key, throttles them per key, and delivers signed domain
//! events to tenant-registered webhooks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: in-memory by default, PostgreSQL with sqlx when configured
//! - **Authentication**: `Authorization: ApiKey <secret>`, SHA-256 hashed at rest
//! - **Webhooks**: HMAC-SHA256 signed POSTs, concurrent fan-out
//! - **Format**: JSON requests/responses, problem details for errors
//!
//! # Request Pipeline
//!
//! request span -> HTTP trace -> API key auth -> forwarded identity -> rate limit -> handler

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod state;
pub mod storage;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Tenant-scoped API endpoints
    let authenticated_routes = Router::new()
        // API key management
        .route(
            "/api/v1/api-keys",
            post(handlers::api_keys::issue_api_key).get(handlers::api_keys::list_api_keys),
        )
        .route(
            "/api/v1/api-keys/{id}",
            delete(handlers::api_keys::revoke_api_key),
        )
        // Webhook routes
        .route(
            "/api/v1/webhooks",
            post(handlers::webhooks::create_webhook).get(handlers::webhooks::list_webhooks),
        )
        .route(
            "/api/v1/webhooks/{id}",
            delete(handlers::webhooks::delete_webhook),
        )
        // Domain event intake
        .route("/api/v1/events", post(handlers::events::emit_event))
        // Route layers run last-added first: API key auth, forwarded identity, rate limit
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::forwarded_identity_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_snapshot))
        .route(
            "/metrics/prometheus",
            get(handlers::metrics::prometheus_metrics),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::trace::request_span_middleware,
        ))
        .with_state(state)
}
