//! `quayside-auth`: authentication and request-security core.
//!
//! Identity resolution (password login, session, API key), the account-status
//! state machine, brute-force mitigation and the cache-through discipline
//! backing every authorization decision.
//!
//! This crate is intentionally decoupled from HTTP and from concrete storage:
//! the cache and the durable store are injected through [`CacheClient`],
//! [`AccountStore`] and [`ApiKeyStore`]. Everything here is synchronous and
//! blocking; correctness under concurrency rests on the cache's atomic
//! primitives, never on client-side locking.

pub mod account;
pub mod api_key;
pub mod authenticator;
pub mod authorize;
pub mod cache;
pub mod config;
pub mod cookie;
pub mod directory;
pub mod error;
pub mod gate;
pub mod keys;
pub mod permissions;
pub mod roles;
pub mod secret;
pub mod session;
pub mod store;

pub use account::{Account, AccountStatus, AccountUpdate, History, UnknownStatus};
pub use api_key::{ApiKeyRecord, ApiKeyStatus, hash_api_key};
pub use authenticator::{Authenticated, Authenticator, LoginPolicy};
pub use authorize::{AuthzError, can_access, can_edit, require_level};
pub use cache::{CacheClient, InMemoryCache};
pub use config::{AuthConfig, ConfigError};
pub use cookie::{CookieAction, CookiePolicy, SessionCookie};
pub use directory::{AccountDirectory, ApiKeyDirectory};
pub use error::{AuthError, CacheError, ErrorClass, StoreError};
pub use gate::{GatePolicy, RequestGate};
pub use keys::CacheKeys;
pub use permissions::PermissionLevel;
pub use roles::{Module, RoleMap};
pub use secret::{HashingPolicy, SecretHasher};
pub use session::{Session, SessionStore};
pub use store::{AccountStore, ApiKeyStore, InMemoryAccountStore, InMemoryApiKeyStore};
