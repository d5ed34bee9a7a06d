//! API key registry - issuance, validation, enumeration and revocation.
//!
//! # Storage
//!
//! Only the SHA-256 hash of each secret is persisted. The plaintext leaves
//! [`ApiKeyRegistry::issue`] exactly once and cannot be recovered afterwards.
//!
//! # Timing
//!
//! [`ApiKeyRegistry::validate`] does the same work for an unknown secret and for a
//! revoked key. A miss is replaced by an owned stand-in record, then both outcomes
//! run one constant-time hash comparison and a branch-free combination with the
//! known and revocation flags.

use std::sync::Arc;

use chrono::Utc;
use subtle::{Choice, ConstantTimeEq};
use uuid::Uuid;

use crate::{
    crypto,
    error::StorageError,
    models::api_key::{ApiKey, ApiKeyResponse},
    observability::Observability,
    storage::ApiKeyStore,
};

/// Hash of the stand-in record used when a lookup misses.
const UNKNOWN_KEY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Owned record of the same shape as a stored key, already revoked.
fn unknown_key() -> ApiKey {
    let now = Utc::now();
    ApiKey {
        id: Uuid::nil(),
        tenant_id: Uuid::nil(),
        key_hash: UNKNOWN_KEY_HASH.to_string(),
        name: String::from("unknown"),
        scopes: Vec::new(),
        created_at: now,
        revoked_at: Some(now),
    }
}

/// Accept `found` only if it is known, its hash matches and it is not revoked.
///
/// A miss is replaced by [`unknown_key`] so both outcomes hold one owned record,
/// run one constant-time comparison and combine every flag without branching.
fn resolve(presented_hash: &str, found: Option<ApiKey>) -> Option<ApiKey> {
    let known = Choice::from(u8::from(found.is_some()));
    let candidate = found.unwrap_or_else(unknown_key);

    let hash_matches = candidate
        .key_hash
        .as_bytes()
        .ct_eq(presented_hash.as_bytes());
    let active = Choice::from(u8::from(candidate.revoked_at.is_none()));

    if bool::from(known & hash_matches & active) {
        Some(candidate)
    } else {
        None
    }
}

pub struct ApiKeyRegistry {
    store: Arc<dyn ApiKeyStore>,
    observability: Arc<Observability>,
    prefix: String,
}

impl ApiKeyRegistry {
    pub fn new(
        store: Arc<dyn ApiKeyStore>,
        observability: Arc<Observability>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            observability,
            prefix: prefix.into(),
        }
    }

    /// Issue a new key for `tenant_id`.
    ///
    /// # Returns
    ///
    /// The plaintext secret (shown only here) and the stored record.
    ///
    /// # Errors
    ///
    /// - `StorageError`: the key store rejected the write
    pub async fn issue(
        &self,
        tenant_id: Uuid,
        scopes: Vec<String>,
        name: String,
    ) -> Result<(String, ApiKey), StorageError> {
        let tenant = tenant_id.to_string();
        self.observability
            .in_span("api_key.issue", &[("tenant_id", tenant.as_str())], async {
                let secret = format!("{}{}", self.prefix, crypto::generate_secret());
                let key = ApiKey {
                    id: Uuid::new_v4(),
                    tenant_id,
                    key_hash: crypto::hash_secret(&secret),
                    name,
                    scopes,
                    created_at: Utc::now(),
                    revoked_at: None,
                };

                self.store.put(key.clone()).await?;
                tracing::info!(key_id = %key.id, tenant_id = %tenant_id, "API key issued");

                Ok::<_, StorageError>((secret, key))
            })
            .await
    }

    /// Resolve a presented secret to its key.
    ///
    /// Returns `Ok(None)` both when the secret was never issued and when the key
    /// has been revoked; the two cases are indistinguishable to the caller.
    pub async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, StorageError> {
        self.observability
            .in_span("api_key.validate", &[], async {
                let presented_hash = crypto::hash_secret(secret);
                let found = self.store.get_by_hash(&presented_hash).await?;
                let resolved = resolve(&presented_hash, found);
                Ok::<_, StorageError>(resolved)
            })
            .await
    }

    /// Revoke a key owned by `tenant_id`.
    ///
    /// Idempotent: returns `false` for unknown keys, keys of other tenants and keys
    /// that are already revoked.
    pub async fn revoke(&self, key_id: Uuid, tenant_id: Uuid) -> Result<bool, StorageError> {
        let revoked = self
            .store
            .mark_revoked(key_id, tenant_id, Utc::now())
            .await?;

        if revoked {
            tracing::info!(key_id = %key_id, tenant_id = %tenant_id, "API key revoked");
        }

        Ok(revoked)
    }

    /// Active keys of a tenant, without hashes.
    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyResponse>, StorageError> {
        let keys = self.store.list_by_tenant(tenant_id).await?;
        Ok(keys.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryApiKeyStore;
    use async_trait::async_trait;
    use chrono::DateTime;

    fn registry() -> (ApiKeyRegistry, Arc<InMemoryApiKeyStore>) {
        let store = Arc::new(InMemoryApiKeyStore::new());
        let registry = ApiKeyRegistry::new(store.clone(), Arc::new(Observability::new()), "ak_");
        (registry, store)
    }

    #[tokio::test]
    async fn issued_keys_validate() {
        let (registry, _) = registry();
        let tenant_id = Uuid::new_v4();

        let (secret, key) = registry
            .issue(tenant_id, vec!["task:read".into()], "ci".into())
            .await
            .unwrap();

        assert!(secret.starts_with("ak_"));
        assert_eq!(secret.len(), "ak_".len() + 64);
        assert_ne!(key.key_hash, secret);

        let validated = registry.validate(&secret).await.unwrap().unwrap();
        assert_eq!(validated, key);
        assert_eq!(validated.scopes, vec!["task:read".to_string()]);
    }

    #[tokio::test]
    async fn revoked_keys_do_not_validate_but_hash_remains() {
        let (registry, store) = registry();
        let tenant_id = Uuid::new_v4();
        let (secret, key) = registry.issue(tenant_id, vec![], "ci".into()).await.unwrap();

        assert!(registry.revoke(key.id, tenant_id).await.unwrap());

        assert!(registry.validate(&secret).await.unwrap().is_none());
        assert!(store.get_by_hash(&key.key_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_secret_does_not_validate() {
        let (registry, _) = registry();
        assert!(registry.validate("ak_never_issued").await.unwrap().is_none());
        assert!(registry.validate("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (registry, _) = registry();
        let tenant_id = Uuid::new_v4();
        let (_, key) = registry.issue(tenant_id, vec![], "ci".into()).await.unwrap();

        assert!(!registry.revoke(Uuid::new_v4(), tenant_id).await.unwrap());
        assert_eq!(registry.list(tenant_id).await.unwrap().len(), 1);

        assert!(registry.revoke(key.id, tenant_id).await.unwrap());
        assert!(!registry.revoke(key.id, tenant_id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_ignores_other_tenants() {
        let (registry, _) = registry();
        let owner = Uuid::new_v4();
        let (secret, key) = registry.issue(owner, vec![], "ci".into()).await.unwrap();

        assert!(!registry.revoke(key.id, Uuid::new_v4()).await.unwrap());
        assert!(registry.validate(&secret).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_returns_active_keys_only() {
        let (registry, _) = registry();
        let tenant_id = Uuid::new_v4();
        let (_, first) = registry.issue(tenant_id, vec![], "one".into()).await.unwrap();
        registry.issue(tenant_id, vec![], "two".into()).await.unwrap();
        registry.issue(Uuid::new_v4(), vec![], "other".into()).await.unwrap();

        registry.revoke(first.id, tenant_id).await.unwrap();

        let listed = registry.list(tenant_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "two");

        let json = serde_json::to_value(&listed[0]).unwrap();
        assert!(json.get("key_hash").is_none());
    }

    #[test]
    fn miss_is_rejected_even_against_the_stand_in_hash() {
        assert!(resolve(UNKNOWN_KEY_HASH, None).is_none());

        let stand_in = unknown_key();
        assert_eq!(stand_in.key_hash.len(), crypto::hash_secret("x").len());
        assert!(!stand_in.is_active());
    }

    #[test]
    fn resolve_accepts_only_active_matching_records() {
        let hash = crypto::hash_secret("ak_live");
        let mut key = ApiKey {
            key_hash: hash.clone(),
            revoked_at: None,
            ..unknown_key()
        };

        assert!(resolve(&hash, Some(key.clone())).is_some());
        assert!(resolve(&crypto::hash_secret("ak_other"), Some(key.clone())).is_none());

        key.revoked_at = Some(Utc::now());
        assert!(resolve(&hash, Some(key)).is_none());
    }

    #[tokio::test]
    async fn unknown_and_revoked_keys_take_comparable_time() {
        let (registry, _) = registry();
        let tenant_id = Uuid::new_v4();
        let (revoked, key) = registry
            .issue(tenant_id, vec!["task:read".into(), "process:start".into()], "ci".into())
            .await
            .unwrap();
        registry.revoke(key.id, tenant_id).await.unwrap();
        let unknown = format!("ak_{}", crypto::generate_secret());

        const ROUNDS: usize = 15;
        const CALLS: u32 = 300;
        let mut ratios = Vec::with_capacity(ROUNDS);
        for _ in 0..ROUNDS {
            let started = std::time::Instant::now();
            for _ in 0..CALLS {
                assert!(registry.validate(&revoked).await.unwrap().is_none());
            }
            let revoked_elapsed = started.elapsed().as_secs_f64();

            let started = std::time::Instant::now();
            for _ in 0..CALLS {
                assert!(registry.validate(&unknown).await.unwrap().is_none());
            }
            let unknown_elapsed = started.elapsed().as_secs_f64();

            ratios.push(revoked_elapsed / unknown_elapsed);
        }

        ratios.sort_by(|a, b| a.total_cmp(b));
        let median = ratios[ROUNDS / 2];
        assert!(
            (0.5..2.0).contains(&median),
            "revoked/unknown validate time ratio {median}"
        );
    }

    struct FailingStore;

    #[async_trait]
    impl ApiKeyStore for FailingStore {
        async fn get_by_hash(&self, _: &str) -> Result<Option<ApiKey>, StorageError> {
            Err(StorageError::Unavailable("down".into()))
        }
        async fn put(&self, _: ApiKey) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".into()))
        }
        async fn list_by_tenant(&self, _: Uuid) -> Result<Vec<ApiKey>, StorageError> {
            Err(StorageError::Unavailable("down".into()))
        }
        async fn mark_revoked(
            &self,
            _: Uuid,
            _: Uuid,
            _: DateTime<Utc>,
        ) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn storage_errors_propagate_and_close_span() {
        let observability = Arc::new(Observability::new());
        let registry = ApiKeyRegistry::new(Arc::new(FailingStore), observability.clone(), "ak_");

        assert!(matches!(
            registry.issue(Uuid::new_v4(), vec![], "x".into()).await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(registry.validate("anything").await.is_err());

        assert_eq!(
            observability.metric("span.api_key.issue.count", &[("status", "error")]),
            Some(1.0)
        );
        assert_eq!(
            observability.metric("span.api_key.validate.count", &[("status", "error")]),
            Some(1.0)
        );
    }
}
