//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Enforce per-key quotas
//! - Trace requests
//! - Short-circuit requests (reject unauthorized or throttled callers)

/// API key and forwarded-identity authentication
pub mod auth;
/// Fixed-window rate limiting
pub mod rate_limit;
/// Request spans
pub mod trace;
