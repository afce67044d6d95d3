//! Login, activation, identification and the account-status state machine.
//!
//! ```text
//! Pending --activate--> Active
//! {Pending, Active} --failed attempts >= threshold--> Locked
//! Locked / Inactive: administrative only
//! ```
//!
//! The order of checks in [`Authenticator::login`] controls what a caller can
//! learn about an account and must not change: a pending account is only
//! revealed when *no* secret is supplied; any wrong secret looks the same
//! regardless of status.

use std::sync::Arc;
use std::time::Duration;

use quayside_core::Clock;
use quayside_events::{AccountChange, AccountNotifier};

use crate::{
    Account, AccountDirectory, AccountStatus, AccountUpdate, ApiKeyDirectory, AuthConfig,
    AuthError, CacheClient, CookieAction, History, Module, SecretHasher, Session, SessionStore,
    authorize,
};

const ACTIVATED: &str = "account activated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    /// Consecutive failures that lock an account.
    pub max_failed_attempts: u32,
    pub session_ttl: Duration,
    /// Shortest secret accepted at activation.
    pub min_secret_len: usize,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            session_ttl: Duration::from_secs(2 * 60 * 60),
            min_secret_len: 8,
        }
    }
}

/// Successful interactive authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub account: Account,
    pub session: Session,
}

impl Authenticated {
    pub fn cookie_action(&self) -> CookieAction {
        CookieAction::Set(self.session.clone())
    }
}

pub struct Authenticator {
    accounts: AccountDirectory,
    api_keys: ApiKeyDirectory,
    sessions: SessionStore,
    hasher: SecretHasher,
    notifier: Arc<dyn AccountNotifier>,
    clock: Arc<dyn Clock>,
    policy: LoginPolicy,
}

impl Authenticator {
    pub fn new(
        accounts: AccountDirectory,
        api_keys: ApiKeyDirectory,
        sessions: SessionStore,
        hasher: SecretHasher,
        notifier: Arc<dyn AccountNotifier>,
        clock: Arc<dyn Clock>,
        policy: LoginPolicy,
    ) -> Self {
        Self {
            accounts,
            api_keys,
            sessions,
            hasher,
            notifier,
            clock,
            policy,
        }
    }

    /// Wire every collaborator from one configuration.
    pub fn from_config(
        config: &AuthConfig,
        cache: Arc<dyn CacheClient>,
        account_store: Arc<dyn crate::AccountStore>,
        api_key_store: Arc<dyn crate::ApiKeyStore>,
        notifier: Arc<dyn AccountNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let keys = config.cache_keys();
        Ok(Self::new(
            AccountDirectory::new(cache.clone(), account_store, keys.clone(), config.session_ttl),
            ApiKeyDirectory::new(
                cache.clone(),
                api_key_store,
                keys.clone(),
                config.api_key_cache_ttl,
            ),
            SessionStore::new(cache, keys, clock.clone()),
            SecretHasher::new(config.hashing_policy())?,
            notifier,
            clock,
            config.login_policy(),
        ))
    }

    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    #[tracing::instrument(skip(self, secret))]
    pub fn login(&self, login_name: &str, secret: &str) -> Result<Authenticated, AuthError> {
        let Some(mut account) = self.accounts.find_by_login_name(login_name)? else {
            tracing::debug!("login for unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        if !account.can_login {
            tracing::debug!(account_id = %account.id, "login attempt on display-only account");
            return Err(AuthError::InvalidCredentials);
        }

        if account.status == AccountStatus::Pending && secret.is_empty() {
            return Err(AuthError::AccountPending);
        }

        let matches = account
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(secret, hash));

        if !matches {
            let attempts = self.record_failed_attempt(&mut account)?;
            if attempts >= self.policy.max_failed_attempts {
                if matches!(account.status, AccountStatus::Pending | AccountStatus::Active) {
                    let reason = format!("account locked after {attempts} failed login attempts");
                    self.lock_account(&mut account, &reason)?;
                }
                return Err(AuthError::MaxAttemptsExceeded);
            }
            tracing::info!(account_id = %account.id, attempts, "failed login");
            return Err(AuthError::InvalidCredentials);
        }

        match account.status {
            AccountStatus::Active => {}
            AccountStatus::Pending => return Err(AuthError::AccountPending),
            AccountStatus::Inactive => return Err(AuthError::AccountInactive),
            AccountStatus::Locked => return Err(AuthError::AccountLocked),
        }

        let now = self.clock.now();
        self.accounts.write_through(
            &mut account,
            &[
                AccountUpdate::ResetFailedAttempts,
                AccountUpdate::SetLastLogin(now),
            ],
        )?;
        let session = self.sessions.create(account.id, self.policy.session_ttl)?;

        tracing::info!(account_id = %account.id, "login succeeded");
        Ok(Authenticated { account, session })
    }

    /// First login of a pending account: set its secret and make it active.
    #[tracing::instrument(skip(self, new_secret))]
    pub fn activate(&self, login_name: &str, new_secret: &str) -> Result<Authenticated, AuthError> {
        let Some(mut account) = self.accounts.find_by_login_name(login_name)? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !account.can_login {
            return Err(AuthError::InvalidCredentials);
        }
        if account.status != AccountStatus::Pending {
            tracing::info!(account_id = %account.id, status = %account.status, "activation refused");
            return Err(AuthError::AccountStatusError);
        }
        if new_secret.chars().count() < self.policy.min_secret_len {
            return Err(AuthError::SecretRejected(format!(
                "secret must be at least {} characters",
                self.policy.min_secret_len
            )));
        }

        let hash = self.hasher.hash(new_secret)?;
        let now = self.clock.now();
        self.accounts.write_through(
            &mut account,
            &[
                AccountUpdate::SetPasswordHash(hash),
                AccountUpdate::SetStatus(AccountStatus::Active),
                AccountUpdate::ResetFailedAttempts,
                AccountUpdate::AppendHistory(History::line(now, ACTIVATED)),
            ],
        )?;
        self.notify(AccountChange::activated(account.id, now));

        let session = self.sessions.create(account.id, self.policy.session_ttl)?;
        tracing::info!(account_id = %account.id, "account activated");
        Ok(Authenticated { account, session })
    }

    /// Resolve the account behind a session token and slide the session's lifetime.
    pub fn identify_from_session(&self, token: Option<&str>) -> Result<Account, AuthError> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::SessionMissing),
        };

        let account_id = self.sessions.validate(token)?;
        let Some(account) = self.accounts.load(account_id)? else {
            tracing::warn!(account_id = %account_id, "session bound to a missing account");
            self.sessions.revoke(token)?;
            return Err(AuthError::SessionInvalid);
        };

        if account.status != AccountStatus::Active {
            return Err(AuthError::AccountStatusError);
        }

        if self.sessions.renew(token, self.policy.session_ttl)?.is_none() {
            return Err(AuthError::SessionInvalid);
        }
        Ok(account)
    }

    /// Resolve the owner of an API key. Stateless: no session is touched.
    pub fn identify_from_api_key(&self, key: Option<&str>) -> Result<Account, AuthError> {
        let key = match key.map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => return Err(AuthError::InvalidApiKey),
        };

        let key_hash = crate::hash_api_key(key);
        let hash_prefix = &key_hash[..8];

        let Some(record) = self.api_keys.load(&key_hash)? else {
            tracing::debug!(key = hash_prefix, "unknown api key");
            return Err(AuthError::InvalidApiKey);
        };
        if !record.is_usable(self.clock.now()) {
            tracing::debug!(key = hash_prefix, status = record.status.as_code(), "unusable api key");
            return Err(AuthError::InvalidApiKey);
        }

        match self.accounts.load(record.owner)? {
            Some(account) => Ok(account),
            None => {
                tracing::warn!(key = hash_prefix, owner = %record.owner, "api key owner does not exist");
                Err(AuthError::InvalidApiKey)
            }
        }
    }

    pub fn can_access(&self, account: &Account, module: Module) -> bool {
        authorize::can_access(account, module)
    }

    pub fn can_edit(&self, account: &Account, module: Module) -> bool {
        authorize::can_edit(account, module)
    }

    /// End the presented session, if any. The cookie is always cleared.
    pub fn logout(&self, token: Option<&str>) -> Result<CookieAction, AuthError> {
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            self.sessions.revoke(token)?;
        }
        Ok(CookieAction::Clear)
    }

    /// Lock `account`, record `reason` in its history and end its sessions.
    pub fn lock_account(&self, account: &mut Account, reason: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        self.accounts.write_through(
            account,
            &[
                AccountUpdate::SetStatus(AccountStatus::Locked),
                AccountUpdate::AppendHistory(History::line(now, reason)),
            ],
        )?;
        let revoked = self.sessions.revoke_all_for(account.id)?;
        tracing::warn!(account_id = %account.id, revoked, reason, "account locked");

        self.notify(AccountChange::locked(account.id, now));
        Ok(())
    }

    /// Count a failed login; returns the authoritative count.
    pub fn record_failed_attempt(&self, account: &mut Account) -> Result<u32, AuthError> {
        self.accounts.record_failed_attempt(account)
    }

    fn notify(&self, change: AccountChange) {
        if let Err(e) = self.notifier.account_changed(&change) {
            tracing::warn!(
                account_id = %change.account_id,
                kind = change.kind.as_str(),
                error = %e,
                "account change notification failed"
            );
        }
    }
}
