//! Infrastructure layer: production adapters for the auth core's collaborators.
//!
//! - `cache`: Redis-backed `CacheClient` (feature `redis`)
//! - `store`: Postgres-backed `AccountStore` / `ApiKeyStore`
//! - `notify`: Redis pub/sub `AccountNotifier` (feature `redis`)
//!
//! The core is blocking; async drivers are bridged onto the current tokio
//! runtime, so these adapters must be called from a runtime context (e.g. a
//! `spawn_blocking` task).

pub mod cache;
pub mod notify;
pub mod store;

pub use store::{PostgresAccountStore, PostgresApiKeyStore};

#[cfg(feature = "redis")]
pub use cache::RedisCache;
#[cfg(feature = "redis")]
pub use notify::RedisPubSubNotifier;
