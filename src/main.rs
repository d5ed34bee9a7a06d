//! Tenant Integration Server - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Initialize logging (and the Prometheus recorder when enabled)
//! 3. Choose storage: PostgreSQL (pool + migrations) or in-memory
//! 4. Build HTTP router with routes and middleware
//! 5. Start the rate-limit window sweeper
//! 6. Start server on configured port

use std::sync::Arc;
use std::time::{Duration, Instant};

use tenant_integration_server::{
    build_router,
    config::Config,
    db,
    observability::{self, Observability},
    services::rate_limiter::RateLimiter,
    state::AppState,
    storage::{
        ApiKeyStore, InMemoryApiKeyStore, InMemorySubscriptionStore, PgApiKeyStore,
        PgSubscriptionStore, SubscriptionStore,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Reads RUST_LOG environment variable (defaults to "info" level)
    observability::init_tracing(config.log_format);
    tracing::info!("Configuration loaded");

    let observability = Arc::new(Observability::new());

    let (api_keys, subscriptions, pool) =
        match &config.database_url {
            Some(database_url) => {
                let pool = db::create_pool(database_url).await?;
                tracing::info!("Database pool created");

                db::run_migrations(&pool).await?;
                tracing::info!("Database migrations complete");

                let api_keys: Arc<dyn ApiKeyStore> = Arc::new(PgApiKeyStore::new(pool.clone()));
                let subscriptions: Arc<dyn SubscriptionStore> =
                    Arc::new(PgSubscriptionStore::new(pool.clone()));
                (api_keys, subscriptions, Some(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage");
                let api_keys: Arc<dyn ApiKeyStore> = Arc::new(InMemoryApiKeyStore::new());
                let subscriptions: Arc<dyn SubscriptionStore> =
                    Arc::new(InMemorySubscriptionStore::new());
                (api_keys, subscriptions, None)
            }
        };

    let mut state = AppState::new(&config, api_keys, subscriptions, observability)?;
    if let Some(pool) = pool {
        state = state.with_database(pool);
    }
    if config.prometheus_enabled {
        if let Some(handle) = observability::init_prometheus() {
            state = state.with_prometheus(handle);
        }
    }

    spawn_window_sweeper(state.limiter.clone(), state.rate_limit.window);

    let app = build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired rate-limit windows so idle keys do not accumulate.
fn spawn_window_sweeper(limiter: Arc<RateLimiter>, window: Duration) {
    let period = window.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let removed = limiter.purge_expired(Instant::now());
            if removed > 0 {
                tracing::debug!(removed, "Purged expired rate limit windows");
            }
        }
    });
}
