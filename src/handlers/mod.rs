//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Delegates to the registry or dispatcher
//! 3. Returns HTTP response (JSON, status code)

/// API key issuance, listing and revocation
pub mod api_keys;
/// Domain event intake
pub mod events;
pub mod health;
pub mod metrics;
/// Webhook subscription management
pub mod webhooks;
