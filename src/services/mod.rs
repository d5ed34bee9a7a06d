//! Business logic services.
//!
//! Services hold the state and rules behind the HTTP layer, so handlers and
//! middleware stay thin.

pub mod api_key_service;
pub mod rate_limiter;
pub mod webhook_service;
