//! Webhook models for subscription registration and event delivery.
//!
//! # Webhook Flow
//!
//! 1. Tenant registers a subscription via `POST /api/v1/webhooks`
//! 2. System stores (or generates) the shared secret used for HMAC signing
//! 3. Domain code emits an event; every matching active subscription gets a signed POST
//! 4. Receiver verifies the signature with the same secret
//!
//! # Security
//!
//! - Secrets are only shown once during registration
//! - Payloads are signed using HMAC-SHA256
//! - HTTPS is required for non-local endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Well-known event names. The dispatcher forwards any `domain.verb` name,
/// these are only here so domain code does not hard-code strings.
pub mod events {
    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_COMPLETED: &str = "process.completed";
    pub const PROCESS_FAILED: &str = "process.failed";
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_ASSIGNED: &str = "task.assigned";
    pub const TASK_COMPLETED: &str = "task.completed";
}

/// Webhook subscription registered by a tenant.
///
/// # Database Table
///
/// Maps to the `webhook_subscriptions` table.
///
/// # Secret Storage
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned in list operations.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn new(tenant_id: Uuid, url: String, secret: String, events: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            url,
            secret,
            events,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Whether this subscription should receive `event_name`.
    pub fn wants(&self, event_name: &str) -> bool {
        self.is_active && self.events.iter().any(|e| e == event_name)
    }
}

/// Request to register a new webhook subscription.
///
/// # Example
///
/// ```json
/// {
///   "url": "https://example.com/webhook",
///   "events": ["process.completed", "task.created"]
/// }
/// ```
///
/// `secret` is optional; one is generated when omitted.
#[derive(Debug, Deserialize)]
pub struct WebhookSubscriptionRequest {
    pub url: String,
    pub events: Vec<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Response when registering or listing subscriptions.
///
/// The `secret` field is ONLY included when creating a new subscription.
#[derive(Debug, Serialize)]
pub struct WebhookSubscriptionResponse {
    pub id: Uuid,
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookSubscription> for WebhookSubscriptionResponse {
    fn from(subscription: WebhookSubscription) -> Self {
        Self {
            id: subscription.id,
            url: subscription.url,
            events: subscription.events,
            secret: None, // Never include secret by default
            is_active: subscription.is_active,
            created_at: subscription.created_at,
        }
    }
}

impl WebhookSubscriptionResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Event envelope delivered to subscribers.
///
/// # Format
///
/// ```json
/// {
///   "event": "process.completed",
///   "tenant_id": "550e8400-e29b-41d4-a716-446655440000",
///   "data": { "process_id": "..." },
///   "timestamp": "2025-01-15T10:30:00Z"
/// }
/// ```
///
/// `data` is an opaque document so new event kinds need no schema change here.
///
/// # Signature Verification
///
/// Deliveries carry `X-Webhook-Signature: sha256=<hex_encoded_hmac>` computed over
/// the exact body bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub tenant_id: Uuid,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(event: impl Into<String>, tenant_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            tenant_id,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Canonical body bytes; the signature is computed over exactly these.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Request body for `POST /api/v1/events`.
#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_expected_fields() {
        let tenant_id = Uuid::new_v4();
        let event = WebhookEvent::new(events::TASK_CREATED, tenant_id, json!({"task_id": 7}));

        let value: serde_json::Value = serde_json::from_slice(&event.to_payload().unwrap()).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 4);
        assert_eq!(value["event"], "task.created");
        assert_eq!(value["tenant_id"], tenant_id.to_string());
        assert_eq!(value["data"]["task_id"], 7);
        assert!(object.contains_key("timestamp"));
    }

    #[test]
    fn inactive_subscriptions_want_nothing() {
        let mut subscription = WebhookSubscription::new(
            Uuid::new_v4(),
            "https://example.com/hook".into(),
            "secret".into(),
            vec![events::PROCESS_STARTED.into()],
        );
        assert!(subscription.wants("process.started"));
        assert!(!subscription.wants("process.completed"));

        subscription.is_active = false;
        assert!(!subscription.wants("process.started"));
    }

    #[test]
    fn response_hides_secret_unless_requested() {
        let subscription = WebhookSubscription::new(
            Uuid::new_v4(),
            "https://example.com/hook".into(),
            "s3cret".into(),
            vec!["task.created".into()],
        );

        let plain = serde_json::to_value(WebhookSubscriptionResponse::from(subscription.clone())).unwrap();
        assert!(plain.get("secret").is_none());

        let shown = serde_json::to_value(
            WebhookSubscriptionResponse::from(subscription).with_secret("s3cret".into()),
        )
        .unwrap();
        assert_eq!(shown["secret"], "s3cret");
    }
}
