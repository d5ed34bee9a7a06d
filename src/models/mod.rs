//! Data models representing stored entities and API payloads.

/// API key authentication model
pub mod api_key;
/// Webhook subscription and event envelope models
pub mod webhook;
