//! Service wiring: in-memory collaborators for development and tests, or
//! Redis + Postgres when configured.
//!
//! - `REDIS_URL` set: Redis cache (sessions, projections, rate limiting).
//! - `DATABASE_URL` set: Postgres account and API-key stores.
//! - `QUAYSIDE_NOTIFY_CHANNEL` set (with `REDIS_URL`): account changes are
//!   published over Redis pub/sub.
//!
//! Anything not configured falls back to the in-memory implementation.

use std::sync::Arc;

use anyhow::Context;

use quayside_auth::{
    AccountStore, ApiKeyStore, AuthConfig, AuthError, Authenticator, CacheClient, InMemoryAccountStore,
    InMemoryApiKeyStore, InMemoryCache, RequestGate, SessionCookie,
};
use quayside_core::{Clock, SystemClock};
use quayside_events::{AccountNotifier, InMemoryNotifier};
use quayside_infra::{PostgresAccountStore, PostgresApiKeyStore, RedisCache, RedisPubSubNotifier};

/// Shared, cheaply cloneable handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub gate: Arc<RequestGate>,
    pub cookie: SessionCookie,
}

impl AppState {
    /// Wire the authenticator, gate and cookie policy over the given collaborators.
    pub fn new(
        config: &AuthConfig,
        cache: Arc<dyn CacheClient>,
        accounts: Arc<dyn AccountStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        notifier: Arc<dyn AccountNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let gate = RequestGate::new(cache.clone(), config.cache_keys(), config.gate_policy());
        let auth = Authenticator::from_config(config, cache, accounts, api_keys, notifier, clock)?;
        Ok(Self {
            auth: Arc::new(auth),
            gate: Arc::new(gate),
            cookie: SessionCookie::new(config.cookie_policy()),
        })
    }

    /// Everything in memory. Used by tests and local development.
    pub fn in_memory(
        config: &AuthConfig,
        accounts: Arc<InMemoryAccountStore>,
        api_keys: Arc<InMemoryApiKeyStore>,
    ) -> Result<Self, AuthError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(
            config,
            Arc::new(InMemoryCache::new(clock.clone())),
            accounts,
            api_keys,
            Arc::new(InMemoryNotifier::new()),
            clock,
        )
    }
}

/// Build the state from the environment.
pub async fn build_state(config: &AuthConfig) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let redis_url = std::env::var("REDIS_URL").ok();

    let cache: Arc<dyn CacheClient> = match &redis_url {
        Some(url) => {
            let cache = RedisCache::new(url).context("invalid REDIS_URL")?;
            let probe = cache.clone();
            tokio::task::spawn_blocking(move || probe.ping())
                .await
                .context("redis probe task failed")?
                .context("redis unreachable")?;
            tracing::info!("using redis cache");
            Arc::new(cache)
        }
        None => {
            tracing::warn!("REDIS_URL not set; sessions and rate limits are process-local");
            Arc::new(InMemoryCache::new(clock.clone()))
        }
    };

    let (accounts, api_keys): (Arc<dyn AccountStore>, Arc<dyn ApiKeyStore>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(&url)
                    .await
                    .context("failed to connect to postgres")?;
                tracing::info!("using postgres account store");
                (
                    Arc::new(PostgresAccountStore::new(pool.clone())),
                    Arc::new(PostgresApiKeyStore::new(pool)),
                )
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set; using an empty in-memory account store");
                (
                    Arc::new(InMemoryAccountStore::new()),
                    Arc::new(InMemoryApiKeyStore::new()),
                )
            }
        };

    let notifier: Arc<dyn AccountNotifier> =
        match (redis_url, std::env::var("QUAYSIDE_NOTIFY_CHANNEL").ok()) {
            (Some(url), Some(channel)) => {
                tracing::info!(channel = %channel, "publishing account changes over redis");
                Arc::new(RedisPubSubNotifier::new(url, channel).context("invalid notifier config")?)
            }
            _ => Arc::new(InMemoryNotifier::new()),
        };

    Ok(AppState::new(config, cache, accounts, api_keys, notifier, clock)?)
}
