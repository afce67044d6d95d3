//! Session issuance, validation, sliding renewal and revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};

use quayside_core::{AccountId, Clock};

use crate::{AuthError, CacheClient, CacheError, CacheKeys};

const TOKEN_BYTES: usize = 32;
const CREATE_ATTEMPTS: usize = 3;

/// Proof of a prior successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub account_id: AccountId,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    cache: Arc<dyn CacheClient>,
    keys: CacheKeys,
    clock: Arc<dyn Clock>,
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365))
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CacheClient>, keys: CacheKeys, clock: Arc<dyn Clock>) -> Self {
        Self { cache, keys, clock }
    }

    pub fn create(&self, account_id: AccountId, ttl: Duration) -> Result<Session, AuthError> {
        let value = account_id.to_string();
        for _ in 0..CREATE_ATTEMPTS {
            let token = generate_token();
            if self.cache.set_nx_ex(&self.keys.session(&token), &value, ttl)? {
                tracing::debug!(account_id = %account_id, "session created");
                return Ok(Session {
                    token,
                    account_id,
                    expires_at: expiry(self.clock.now(), ttl),
                });
            }
        }
        Err(CacheError::Command("could not allocate a unique session token".to_string()).into())
    }

    /// Account bound to `token`; `SessionInvalid` if absent or expired.
    pub fn validate(&self, token: &str) -> Result<AccountId, AuthError> {
        let key = self.keys.session(token);
        let Some(raw) = self.cache.get(&key)? else {
            return Err(AuthError::SessionInvalid);
        };

        match raw.parse::<AccountId>() {
            Ok(id) => Ok(id),
            Err(e) => {
                tracing::warn!(error = %e, "discarding session with malformed account id");
                self.cache.del(&key)?;
                Err(AuthError::SessionInvalid)
            }
        }
    }

    /// Slide the session's expiry; `None` if it no longer exists.
    pub fn renew(&self, token: &str, ttl: Duration) -> Result<Option<DateTime<Utc>>, AuthError> {
        if self.cache.expire(&self.keys.session(token), ttl)? {
            Ok(Some(expiry(self.clock.now(), ttl)))
        } else {
            Ok(None)
        }
    }

    pub fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.cache.del(&self.keys.session(token))?)
    }

    /// Delete every session bound to `account_id`. Returns how many were removed.
    pub fn revoke_all_for(&self, account_id: AccountId) -> Result<usize, AuthError> {
        let wanted = account_id.to_string();
        let mut revoked = 0;

        for key in self.cache.scan(&self.keys.session_pattern())? {
            // Sessions may expire between SCAN and GET.
            if self.cache.get(&key)?.as_deref() == Some(wanted.as_str()) && self.cache.del(&key)? {
                revoked += 1;
            }
        }

        if revoked > 0 {
            tracing::info!(account_id = %account_id, revoked, "sessions revoked");
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use quayside_core::ManualClock;

    use super::*;
    use crate::InMemoryCache;

    const TTL: Duration = Duration::from_secs(60);

    fn store() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        (
            clock.clone(),
            SessionStore::new(cache, CacheKeys::default(), clock),
        )
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let (_clock, store) = store();
        let id = AccountId::new();
        let a = store.create(id, TTL).unwrap();
        let b = store.create(id, TTL).unwrap();
        assert_eq!(a.token.len(), TOKEN_BYTES * 2);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn validate_resolves_live_sessions_only() {
        let (clock, store) = store();
        let id = AccountId::new();
        let session = store.create(id, TTL).unwrap();
        assert_eq!(session.expires_at, clock.now() + chrono::Duration::seconds(60));
        assert_eq!(store.validate(&session.token).unwrap(), id);

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(store.validate(&session.token), Err(AuthError::SessionInvalid));
    }

    #[test]
    fn renew_slides_the_lifetime() {
        let (clock, store) = store();
        let session = store.create(AccountId::new(), TTL).unwrap();

        clock.advance(chrono::Duration::seconds(50));
        assert!(store.renew(&session.token, TTL).unwrap().is_some());
        clock.advance(chrono::Duration::seconds(50));
        assert!(store.validate(&session.token).is_ok());
    }

    #[test]
    fn renew_of_unknown_token_is_none() {
        let (_clock, store) = store();
        assert_eq!(store.renew("nope", TTL).unwrap(), None);
    }

    #[test]
    fn revoked_sessions_are_invalid() {
        let (_clock, store) = store();
        let session = store.create(AccountId::new(), TTL).unwrap();
        assert!(store.revoke(&session.token).unwrap());
        assert_eq!(store.validate(&session.token), Err(AuthError::SessionInvalid));
        assert!(!store.revoke(&session.token).unwrap());
    }

    #[test]
    fn revoke_all_for_spares_other_accounts() {
        let (_clock, store) = store();
        let mine = AccountId::new();
        let theirs = AccountId::new();
        let a = store.create(mine, TTL).unwrap();
        let b = store.create(mine, TTL).unwrap();
        let c = store.create(theirs, TTL).unwrap();

        assert_eq!(store.revoke_all_for(mine).unwrap(), 2);
        assert!(store.validate(&a.token).is_err());
        assert!(store.validate(&b.token).is_err());
        assert_eq!(store.validate(&c.token).unwrap(), theirs);
    }
}
