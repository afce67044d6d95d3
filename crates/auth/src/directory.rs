//! Cache-through repositories for accounts and API keys.
//!
//! Reads hit the cache first and populate it from the durable store on a
//! miss. Writes go to the durable store and then to the cached projection as
//! two independent operations; the store stays authoritative and is replayed
//! into the cache on the next miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use quayside_core::AccountId;

use crate::{
    Account, AccountStatus, AccountStore, AccountUpdate, ApiKeyRecord, ApiKeyStore, AuthError,
    CacheClient, CacheKeys, History, RoleMap, StoreError,
};

mod field {
    pub const ID: &str = "id";
    pub const LOGIN_NAME: &str = "login_name";
    pub const PASSWORD_HASH: &str = "password_hash";
    pub const CAN_LOGIN: &str = "can_login";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const FAILED_ATTEMPTS: &str = "failed_attempts";
    pub const LAST_LOGIN_AT: &str = "last_login_at";
    pub const STATUS: &str = "status";
    pub const ROLES: &str = "roles";
    pub const HISTORY: &str = "history";
    pub const COMMENTS: &str = "comments";
}

fn store_failure(err: StoreError) -> AuthError {
    match err {
        StoreError::UnknownStatus(code) => {
            tracing::error!(status = %code, "durable account record carries an unknown status");
            AuthError::AccountStatusError
        }
        other => {
            tracing::error!(error = %other, "durable store failure");
            AuthError::Store(other)
        }
    }
}

fn encode_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.to_rfc3339()).unwrap_or_default()
}

fn update_field(account: &Account, update: &AccountUpdate) -> (String, String) {
    let (name, value) = match update {
        AccountUpdate::SetPasswordHash(_) => (
            field::PASSWORD_HASH,
            account.password_hash.clone().unwrap_or_default(),
        ),
        AccountUpdate::SetStatus(_) => (field::STATUS, account.status.as_code().to_string()),
        AccountUpdate::ResetFailedAttempts => {
            (field::FAILED_ATTEMPTS, account.failed_attempts.to_string())
        }
        AccountUpdate::SetLastLogin(_) => {
            (field::LAST_LOGIN_AT, encode_timestamp(account.last_login_at))
        }
        AccountUpdate::AppendHistory(_) => (field::HISTORY, account.history.as_str().to_string()),
    };
    (name.to_string(), value)
}

/// Flat hash projection of an account, as stored in the cache.
pub fn encode_projection(account: &Account) -> Vec<(String, String)> {
    [
        (field::ID, account.id.to_string()),
        (field::LOGIN_NAME, account.login_name.clone()),
        (
            field::PASSWORD_HASH,
            account.password_hash.clone().unwrap_or_default(),
        ),
        (field::CAN_LOGIN, if account.can_login { "1" } else { "0" }.to_string()),
        (field::DISPLAY_NAME, account.display_name.clone()),
        (field::FAILED_ATTEMPTS, account.failed_attempts.to_string()),
        (field::LAST_LOGIN_AT, encode_timestamp(account.last_login_at)),
        (field::STATUS, account.status.as_code().to_string()),
        (field::ROLES, account.roles.to_json()),
        (field::HISTORY, account.history.as_str().to_string()),
        (field::COMMENTS, account.comments.clone()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Inverse of [`encode_projection`]. Any missing or garbled field is an error.
pub fn decode_projection(fields: &HashMap<String, String>) -> Result<Account, StoreError> {
    let get = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Malformed(format!("projection lacks '{name}'")))
    };

    let id = get(field::ID)?
        .parse::<AccountId>()
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    let password_hash = Some(get(field::PASSWORD_HASH)?.clone()).filter(|h| !h.is_empty());
    let can_login = match get(field::CAN_LOGIN)?.as_str() {
        "1" => true,
        "0" => false,
        other => return Err(StoreError::Malformed(format!("can_login '{other}'"))),
    };
    let failed_attempts = get(field::FAILED_ATTEMPTS)?
        .parse::<u32>()
        .map_err(|e| StoreError::Malformed(format!("failed_attempts: {e}")))?;
    let last_login_at = match get(field::LAST_LOGIN_AT)?.as_str() {
        "" => None,
        raw => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| StoreError::Malformed(format!("last_login_at: {e}")))?
                .with_timezone(&Utc),
        ),
    };
    let status = AccountStatus::try_from(get(field::STATUS)?.as_str())?;

    Ok(Account {
        id,
        login_name: get(field::LOGIN_NAME)?.clone(),
        password_hash,
        can_login,
        display_name: get(field::DISPLAY_NAME)?.clone(),
        failed_attempts,
        last_login_at,
        status,
        roles: RoleMap::from_stored(get(field::ROLES)?),
        history: History::from_text(get(field::HISTORY)?.clone()),
        comments: get(field::COMMENTS)?.clone(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

pub struct AccountDirectory {
    cache: Arc<dyn CacheClient>,
    store: Arc<dyn AccountStore>,
    keys: CacheKeys,
    /// Lifetime of a cached projection; the session lifetime.
    ttl: Duration,
}

impl AccountDirectory {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        store: Arc<dyn AccountStore>,
        keys: CacheKeys,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            keys,
            ttl,
        }
    }

    /// Account by id; cache first, durable store on a miss.
    pub fn load(&self, id: AccountId) -> Result<Option<Account>, AuthError> {
        let key = self.keys.account(id);

        let fields = self.cache.hgetall(&key)?;
        if !fields.is_empty() {
            match decode_projection(&fields) {
                Ok(account) => {
                    self.cache.expire(&key, self.ttl)?;
                    return Ok(Some(account));
                }
                Err(e) => {
                    tracing::debug!(account_id = %id, error = %e, "discarding unreadable cached projection");
                }
            }
        }

        let Some(account) = self.store.find_by_id(id).map_err(store_failure)? else {
            return Ok(None);
        };
        self.cache
            .hset_all(&key, &encode_projection(&account), self.ttl)?;
        Ok(Some(account))
    }

    pub fn find_by_login_name(&self, login_name: &str) -> Result<Option<Account>, AuthError> {
        match self
            .store
            .find_id_by_login_name(login_name)
            .map_err(store_failure)?
        {
            Some(id) => self.load(id),
            None => Ok(None),
        }
    }

    /// Apply `updates` to `account`, the durable store and the cached projection.
    pub fn write_through(
        &self,
        account: &mut Account,
        updates: &[AccountUpdate],
    ) -> Result<(), AuthError> {
        if updates.is_empty() {
            return Ok(());
        }

        for update in updates {
            update.apply(account);
        }
        self.store
            .apply(account.id, updates)
            .map_err(store_failure)?;

        // Only patch a live projection; an absent one is rebuilt on the next miss.
        let key = self.keys.account(account.id);
        if self.cache.expire(&key, self.ttl)? {
            let fields: Vec<(String, String)> =
                updates.iter().map(|u| update_field(account, u)).collect();
            self.cache.hset(&key, &fields)?;
        }

        tracing::debug!(account_id = %account.id, updates = updates.len(), "account written through");
        Ok(())
    }

    /// Count one failed login. The cache's atomic counter is authoritative.
    pub fn record_failed_attempt(&self, account: &mut Account) -> Result<u32, AuthError> {
        let key = self.keys.account(account.id);
        // The increment must land on a complete projection, never on an empty hash.
        if !self.cache.expire(&key, self.ttl)? {
            self.cache
                .hset_all(&key, &encode_projection(account), self.ttl)?;
        }

        let count = self.cache.hincr(&key, field::FAILED_ATTEMPTS, 1)?;
        self.store
            .increment_failed_attempts(account.id)
            .map_err(store_failure)?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        account.failed_attempts = count;
        Ok(count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API keys
// ─────────────────────────────────────────────────────────────────────────────

/// Cache-through lookup of API key records by key hash.
///
/// The cached record keeps its original TTL (no refresh on read) so a
/// revocation in the durable store always reaches the cache eventually.
pub struct ApiKeyDirectory {
    cache: Arc<dyn CacheClient>,
    store: Arc<dyn ApiKeyStore>,
    keys: CacheKeys,
    ttl: Duration,
}

impl ApiKeyDirectory {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        store: Arc<dyn ApiKeyStore>,
        keys: CacheKeys,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            keys,
            ttl,
        }
    }

    pub fn load(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        let key = self.keys.api_key(key_hash);

        let fields = self.cache.hgetall(&key)?;
        if !fields.is_empty() {
            match ApiKeyRecord::from_fields(key_hash, &fields) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => tracing::debug!(error = %e, "discarding unreadable cached api key"),
            }
        }

        let Some(record) = self.store.find_by_hash(key_hash).map_err(store_failure)? else {
            return Ok(None);
        };
        self.cache.hset_all(&key, &record.to_fields(), self.ttl)?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use quayside_core::{Clock, ManualClock};

    use super::*;
    use crate::{
        ApiKeyStatus, InMemoryAccountStore, InMemoryApiKeyStore, InMemoryCache, Module,
        PermissionLevel, hash_api_key,
    };

    const TTL: Duration = Duration::from_secs(7200);

    struct Fixture {
        clock: Arc<ManualClock>,
        cache: Arc<InMemoryCache>,
        store: Arc<InMemoryAccountStore>,
        directory: AccountDirectory,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        let store = Arc::new(InMemoryAccountStore::new());
        let directory =
            AccountDirectory::new(cache.clone(), store.clone(), CacheKeys::default(), TTL);
        Fixture {
            clock,
            cache,
            store,
            directory,
        }
    }

    fn active_account() -> Account {
        let mut account = Account::pending("stevedore", "Stevedore");
        account.status = AccountStatus::Active;
        account.password_hash = Some("$argon2id$x".to_string());
        account.roles = RoleMap::new().with(Module::Bulk, PermissionLevel::Edit);
        account.last_login_at = Some(Utc::now());
        account
    }

    #[test]
    fn projection_survives_the_cache() {
        let account = active_account();
        let fields: HashMap<String, String> = encode_projection(&account).into_iter().collect();
        assert_eq!(decode_projection(&fields).unwrap(), account);
    }

    #[test]
    fn partial_projection_does_not_decode() {
        let fields = HashMap::from([(field::FAILED_ATTEMPTS.to_string(), "3".to_string())]);
        assert!(matches!(
            decode_projection(&fields),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn load_populates_the_cache_on_miss() {
        let f = fixture();
        let account = active_account();
        f.store.insert(account.clone()).unwrap();

        assert_eq!(f.directory.load(account.id).unwrap(), Some(account.clone()));
        assert!(!f.cache.hgetall(&CacheKeys::default().account(account.id)).unwrap().is_empty());

        // Served from the cache while the store is down.
        f.store.set_unavailable(true);
        assert_eq!(f.directory.load(account.id).unwrap(), Some(account));
    }

    #[test]
    fn load_refreshes_the_cached_ttl() {
        let f = fixture();
        let account = active_account();
        f.store.insert(account.clone()).unwrap();
        f.directory.load(account.id).unwrap();

        f.clock.advance(chrono::Duration::seconds(7000));
        f.directory.load(account.id).unwrap();
        f.clock.advance(chrono::Duration::seconds(7000));

        f.store.set_unavailable(true);
        assert!(f.directory.load(account.id).unwrap().is_some());
    }

    #[test]
    fn unknown_account_is_none() {
        let f = fixture();
        assert_eq!(f.directory.load(AccountId::new()).unwrap(), None);
        assert_eq!(f.directory.find_by_login_name("ghost").unwrap(), None);
    }

    #[test]
    fn store_outage_is_an_infrastructure_error() {
        let f = fixture();
        f.store.set_unavailable(true);
        assert!(matches!(
            f.directory.load(AccountId::new()),
            Err(AuthError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[test]
    fn write_through_reaches_both_stores() {
        let f = fixture();
        let mut account = active_account();
        f.store.insert(account.clone()).unwrap();
        f.directory.load(account.id).unwrap();

        let now = f.clock.now();
        f.directory
            .write_through(
                &mut account,
                &[
                    AccountUpdate::SetStatus(AccountStatus::Locked),
                    AccountUpdate::SetLastLogin(now),
                ],
            )
            .unwrap();

        assert_eq!(account.status, AccountStatus::Locked);
        assert_eq!(f.store.get(account.id).unwrap().status, AccountStatus::Locked);

        f.store.set_unavailable(true);
        let cached = f.directory.load(account.id).unwrap().unwrap();
        assert_eq!(cached.status, AccountStatus::Locked);
        assert_eq!(cached.last_login_at, Some(now));
    }

    #[test]
    fn write_through_does_not_create_a_partial_projection() {
        let f = fixture();
        let mut account = active_account();
        f.store.insert(account.clone()).unwrap();

        f.directory
            .write_through(&mut account, &[AccountUpdate::ResetFailedAttempts])
            .unwrap();
        assert!(f.cache.hgetall(&CacheKeys::default().account(account.id)).unwrap().is_empty());
    }

    #[test]
    fn failed_attempts_count_atomically_in_the_cache() {
        let f = fixture();
        let mut account = active_account();
        f.store.insert(account.clone()).unwrap();

        assert_eq!(f.directory.record_failed_attempt(&mut account).unwrap(), 1);
        assert_eq!(f.directory.record_failed_attempt(&mut account).unwrap(), 2);
        assert_eq!(account.failed_attempts, 2);
        assert_eq!(f.store.get(account.id).unwrap().failed_attempts, 2);
        assert_eq!(f.directory.load(account.id).unwrap().unwrap().failed_attempts, 2);
    }

    #[test]
    fn cache_counter_survives_a_lost_durable_increment() {
        let f = fixture();
        let mut account = active_account();
        f.store.insert(account.clone()).unwrap();

        f.store.set_unavailable(true);
        assert!(matches!(
            f.directory.record_failed_attempt(&mut account),
            Err(AuthError::Store(_))
        ));
        f.store.set_unavailable(false);

        assert_eq!(f.directory.record_failed_attempt(&mut account).unwrap(), 2);
        assert_eq!(f.store.get(account.id).unwrap().failed_attempts, 1);
    }

    #[test]
    fn unknown_stored_status_fails_loudly() {
        struct OddStore;
        impl AccountStore for OddStore {
            fn find_by_id(&self, _: AccountId) -> Result<Option<Account>, StoreError> {
                Err(StoreError::UnknownStatus("archived".to_string()))
            }
            fn find_id_by_login_name(&self, _: &str) -> Result<Option<AccountId>, StoreError> {
                Ok(None)
            }
            fn apply(&self, _: AccountId, _: &[AccountUpdate]) -> Result<(), StoreError> {
                Ok(())
            }
            fn increment_failed_attempts(&self, _: AccountId) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let clock = Arc::new(ManualClock::default());
        let directory = AccountDirectory::new(
            Arc::new(InMemoryCache::new(clock)),
            Arc::new(OddStore),
            CacheKeys::default(),
            TTL,
        );
        assert_eq!(
            directory.load(AccountId::new()),
            Err(AuthError::AccountStatusError)
        );
    }

    #[test]
    fn api_keys_are_cached_for_their_ttl_only() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        let store = Arc::new(InMemoryApiKeyStore::new());
        let ttl = Duration::from_secs(7 * 24 * 3600);
        let directory = ApiKeyDirectory::new(cache, store.clone(), CacheKeys::default(), ttl);

        let record = ApiKeyRecord {
            key_hash: hash_api_key("k"),
            owner: AccountId::new(),
            status: ApiKeyStatus::Active,
            expires_at: None,
        };
        store.insert(record.clone()).unwrap();
        assert_eq!(directory.load(&record.key_hash).unwrap(), Some(record.clone()));

        // Revoked durably; the cached copy still answers until it ages out.
        store
            .insert(ApiKeyRecord {
                status: ApiKeyStatus::Revoked,
                ..record.clone()
            })
            .unwrap();
        assert_eq!(
            directory.load(&record.key_hash).unwrap().unwrap().status,
            ApiKeyStatus::Active
        );

        clock.advance(chrono::Duration::days(7) + chrono::Duration::seconds(1));
        assert_eq!(
            directory.load(&record.key_hash).unwrap().unwrap().status,
            ApiKeyStatus::Revoked
        );
    }
}
