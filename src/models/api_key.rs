//! API Key model for authentication.
//!
//! API keys authenticate tenant-scoped callers. Only the SHA-256 hash of a secret
//! is stored; the plaintext is handed out once at issuance and never again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `tenant_id`: Owning tenant
/// - `key_hash`: SHA-256 hash of the secret (64 hex characters)
/// - `name`: Display name
/// - `scopes`: Granted scope names
/// - `created_at`: When the key was issued
/// - `revoked_at`: Set once, on revocation
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// When a request comes in with "ApiKey abc123", we:
    /// 1. Hash "abc123" with SHA-256
    /// 2. Look up this hash
    /// 3. If found and not revoked, authenticate the request
    pub key_hash: String,

    pub name: String,

    pub scopes: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Revoked keys are rejected during authentication but the record is kept,
    /// so the hash stays known to audit and rate-limit state.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Request body for issuing a new API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "ci-pipeline",
///   "scopes": ["process:start", "task:read"]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct IssueApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub scopes: Vec<String>,
}

/// API key metadata returned to clients. Never carries the hash.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            tenant_id: key.tenant_id,
            name: key.name,
            scopes: key.scopes,
            created_at: key.created_at,
        }
    }
}

/// Response for a freshly issued key: the only time `secret` is ever shown.
#[derive(Debug, Serialize)]
pub struct IssuedApiKeyResponse {
    pub secret: String,

    #[serde(flatten)]
    pub key: ApiKeyResponse,
}
