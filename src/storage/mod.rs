//! Storage abstraction for API keys and webhook subscriptions.
//!
//! The registry and dispatcher only talk to these traits, so the in-memory
//! stores used for single-process deployments and tests can be swapped for
//! the Postgres-backed ones without touching authentication or dispatch logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{api_key::ApiKey, webhook::WebhookSubscription};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryApiKeyStore, InMemorySubscriptionStore};
pub use postgres::{PgApiKeyStore, PgSubscriptionStore};

/// Persistence operations needed by the API key registry.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Look up a key by the hex SHA-256 of its secret. Revoked keys are still returned.
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StorageError>;

    async fn put(&self, key: ApiKey) -> Result<(), StorageError>;

    /// Active keys owned by `tenant_id`, newest first.
    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, StorageError>;

    /// Set `revoked_at` on an active key owned by `tenant_id`.
    ///
    /// Returns `false` when no such active key exists.
    async fn mark_revoked(
        &self,
        key_id: Uuid,
        tenant_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;
}

/// Persistence operations needed by the webhook dispatcher.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn append(&self, subscription: WebhookSubscription) -> Result<(), StorageError>;

    /// Every subscription of the tenant, active or not, as one consistent snapshot.
    async fn list_by_tenant(&self, tenant_id: Uuid)
    -> Result<Vec<WebhookSubscription>, StorageError>;

    /// Returns `false` when the subscription does not exist for this tenant or is already inactive.
    async fn deactivate(&self, tenant_id: Uuid, subscription_id: Uuid)
    -> Result<bool, StorageError>;
}
