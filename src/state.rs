//! Shared application state handed to every handler and middleware.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderName;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::{
    config::Config,
    db::DbPool,
    observability::Observability,
    services::{
        api_key_service::ApiKeyRegistry,
        rate_limiter::RateLimiter,
        webhook_service::{RetryPolicy, WebhookDispatcher},
    },
    storage::{ApiKeyStore, SubscriptionStore},
};

/// Per-key quota applied to API-key principals.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub requests: u32,
    pub window: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ApiKeyRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub observability: Arc<Observability>,
    pub rate_limit: RateLimitSettings,
    /// Header an upstream session layer uses to assert the caller's tenant.
    pub trusted_tenant_header: Option<HeaderName>,
    /// Set only when the durable stores are in use; `/health` pings it.
    pub database: Option<DbPool>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the registry, limiter and dispatcher over the given stores.
    ///
    /// # Errors
    ///
    /// - `TRUSTED_TENANT_HEADER` is not a valid header name
    /// - the outbound HTTP client cannot be built
    pub fn new(
        config: &Config,
        api_keys: Arc<dyn ApiKeyStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        observability: Arc<Observability>,
    ) -> anyhow::Result<Self> {
        let trusted_tenant_header = config
            .trusted_tenant_header
            .as_deref()
            .map(HeaderName::try_from)
            .transpose()
            .context("TRUSTED_TENANT_HEADER is not a valid header name")?;

        let retry = RetryPolicy {
            max_retries: config.webhook_max_retries,
            base_delay: Duration::from_millis(config.webhook_retry_base_ms),
        };
        let dispatcher = WebhookDispatcher::new(
            subscriptions,
            observability.clone(),
            config.webhook_timeout(),
            retry,
        )
        .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            registry: Arc::new(ApiKeyRegistry::new(
                api_keys,
                observability.clone(),
                config.api_key_prefix.clone(),
            )),
            limiter: Arc::new(RateLimiter::new()),
            dispatcher: Arc::new(dispatcher),
            observability,
            rate_limit: RateLimitSettings {
                requests: config.rate_limit_requests,
                window: config.rate_limit_window(),
            },
            trusted_tenant_header,
            database: None,
            prometheus: None,
        })
    }

    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.database = Some(pool);
        self
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
