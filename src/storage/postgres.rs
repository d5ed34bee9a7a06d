//! Postgres-backed stores, used when `DATABASE_URL` is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ApiKeyStore, SubscriptionStore};
use crate::db::DbPool;
use crate::error::StorageError;
use crate::models::{api_key::ApiKey, webhook::WebhookSubscription};

#[derive(Debug, Clone)]
pub struct PgApiKeyStore {
    pool: DbPool,
}

impl PgApiKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StorageError> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT id, tenant_id, key_hash, name, scopes, created_at, revoked_at
             FROM api_keys
             WHERE key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn put(&self, key: ApiKey) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, tenant_id, key_hash, name, scopes, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.id)
        .bind(key.tenant_id)
        .bind(&key.key_hash)
        .bind(&key.name)
        .bind(&key.scopes)
        .bind(key.created_at)
        .bind(key.revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, StorageError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT id, tenant_id, key_hash, name, scopes, created_at, revoked_at
             FROM api_keys
             WHERE tenant_id = $1 AND revoked_at IS NULL
             ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn mark_revoked(
        &self,
        key_id: Uuid,
        tenant_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $3
             WHERE id = $1 AND tenant_id = $2 AND revoked_at IS NULL",
        )
        .bind(key_id)
        .bind(tenant_id)
        .bind(revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: DbPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn append(&self, subscription: WebhookSubscription) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions (id, tenant_id, url, secret, events, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.tenant_id)
        .bind(&subscription.url)
        .bind(&subscription.secret)
        .bind(&subscription.events)
        .bind(subscription.is_active)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WebhookSubscription>, StorageError> {
        let subscriptions = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT id, tenant_id, url, secret, events, is_active, created_at
             FROM webhook_subscriptions
             WHERE tenant_id = $1
             ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn deactivate(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE webhook_subscriptions SET is_active = false
             WHERE id = $1 AND tenant_id = $2 AND is_active = true",
        )
        .bind(subscription_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
