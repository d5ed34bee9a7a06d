//! In-memory stores for single-process deployments and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{ApiKeyStore, SubscriptionStore};
use crate::error::StorageError;
use crate::models::{api_key::ApiKey, webhook::WebhookSubscription};

/// Keys indexed by hash, with a secondary id -> hash index for revocation.
///
/// Each map entry is guarded by its own shard lock, so an issue or revoke only
/// excludes readers of the same key.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    by_hash: DashMap<String, ApiKey>,
    hash_by_id: DashMap<Uuid, String>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StorageError> {
        Ok(self.by_hash.get(key_hash).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: ApiKey) -> Result<(), StorageError> {
        self.hash_by_id.insert(key.id, key.key_hash.clone());
        self.by_hash.insert(key.key_hash.clone(), key);
        Ok(())
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, StorageError> {
        let mut keys: Vec<ApiKey> = self
            .by_hash
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id && entry.is_active())
            .map(|entry| entry.value().clone())
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn mark_revoked(
        &self,
        key_id: Uuid,
        tenant_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        // Clone the hash out so the id index guard is released before touching by_hash.
        let Some(key_hash) = self.hash_by_id.get(&key_id).map(|h| h.value().clone()) else {
            return Ok(false);
        };

        let Some(mut key) = self.by_hash.get_mut(&key_hash) else {
            return Ok(false);
        };

        if key.tenant_id != tenant_id || !key.is_active() {
            return Ok(false);
        }

        key.revoked_at = Some(revoked_at);
        Ok(true)
    }
}

/// Subscriptions grouped per tenant.
///
/// Appends and reads take the tenant's entry lock, so a reader either sees a
/// subscription completely or not at all.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    by_tenant: DashMap<Uuid, Vec<WebhookSubscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn append(&self, subscription: WebhookSubscription) -> Result<(), StorageError> {
        self.by_tenant
            .entry(subscription.tenant_id)
            .or_default()
            .push(subscription);
        Ok(())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WebhookSubscription>, StorageError> {
        Ok(self
            .by_tenant
            .get(&tenant_id)
            .map(|subs| subs.value().clone())
            .unwrap_or_default())
    }

    async fn deactivate(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<bool, StorageError> {
        let Some(mut subs) = self.by_tenant.get_mut(&tenant_id) else {
            return Ok(false);
        };

        match subs
            .iter_mut()
            .find(|s| s.id == subscription_id && s.is_active)
        {
            Some(subscription) => {
                subscription.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tenant_id: Uuid, hash: &str) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            tenant_id,
            key_hash: hash.to_string(),
            name: "test".to_string(),
            scopes: vec![],
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn revoked_keys_stay_retrievable_by_hash() {
        let store = InMemoryApiKeyStore::new();
        let tenant_id = Uuid::new_v4();
        let k = key(tenant_id, "abc");
        store.put(k.clone()).await.unwrap();

        assert!(store.mark_revoked(k.id, tenant_id, Utc::now()).await.unwrap());

        let found = store.get_by_hash("abc").await.unwrap().unwrap();
        assert!(found.revoked_at.is_some());
        assert!(store.list_by_tenant(tenant_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoke_requires_owning_tenant() {
        let store = InMemoryApiKeyStore::new();
        let tenant_id = Uuid::new_v4();
        let k = key(tenant_id, "abc");
        store.put(k.clone()).await.unwrap();

        assert!(!store.mark_revoked(k.id, Uuid::new_v4(), Utc::now()).await.unwrap());
        assert!(store.get_by_hash("abc").await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn list_is_scoped_to_tenant() {
        let store = InMemoryApiKeyStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        store.put(key(tenant_a, "a1")).await.unwrap();
        store.put(key(tenant_a, "a2")).await.unwrap();
        store.put(key(tenant_b, "b1")).await.unwrap();

        assert_eq!(store.list_by_tenant(tenant_a).await.unwrap().len(), 2);
        assert_eq!(store.list_by_tenant(tenant_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_subscriptions_are_kept() {
        let store = InMemorySubscriptionStore::new();
        let tenant_id = Uuid::new_v4();
        for _ in 0..2 {
            store
                .append(WebhookSubscription::new(
                    tenant_id,
                    "https://example.com/hook".into(),
                    "secret".into(),
                    vec!["task.created".into()],
                ))
                .await
                .unwrap();
        }

        assert_eq!(store.list_by_tenant(tenant_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deactivate_is_not_repeatable() {
        let store = InMemorySubscriptionStore::new();
        let tenant_id = Uuid::new_v4();
        let subscription = WebhookSubscription::new(
            tenant_id,
            "https://example.com/hook".into(),
            "secret".into(),
            vec!["task.created".into()],
        );
        let id = subscription.id;
        store.append(subscription).await.unwrap();

        assert!(store.deactivate(tenant_id, id).await.unwrap());
        assert!(!store.deactivate(tenant_id, id).await.unwrap());
        assert!(!store.list_by_tenant(tenant_id).await.unwrap()[0].is_active);
    }
}
