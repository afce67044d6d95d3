//! Durable store contracts (source of truth) and in-memory implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use quayside_core::AccountId;

use crate::{Account, AccountUpdate, ApiKeyRecord, StoreError};

/// Durable account records.
///
/// Every method is a single round-trip; `apply` writes all updates in one
/// statement so a partially applied mutation is never observable.
pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    fn find_id_by_login_name(&self, login_name: &str) -> Result<Option<AccountId>, StoreError>;

    fn apply(&self, id: AccountId, updates: &[AccountUpdate]) -> Result<(), StoreError>;

    /// Atomic `failed_attempts = failed_attempts + 1`.
    fn increment_failed_attempts(&self, id: AccountId) -> Result<(), StoreError>;
}

impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_id_by_login_name(&self, login_name: &str) -> Result<Option<AccountId>, StoreError> {
        (**self).find_id_by_login_name(login_name)
    }

    fn apply(&self, id: AccountId, updates: &[AccountUpdate]) -> Result<(), StoreError> {
        (**self).apply(id, updates)
    }

    fn increment_failed_attempts(&self, id: AccountId) -> Result<(), StoreError> {
        (**self).increment_failed_attempts(id)
    }
}

/// Durable API key records, looked up by key hash.
pub trait ApiKeyStore: Send + Sync {
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;
}

impl<S> ApiKeyStore for Arc<S>
where
    S: ApiKeyStore + ?Sized,
{
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        (**self).find_by_hash(key_hash)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementations
// ─────────────────────────────────────────────────────────────────────────────

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// In-memory account store for tests/dev.
///
/// `set_unavailable` makes every call fail, for exercising outage paths.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    unavailable: RwLock<bool>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        accounts.insert(account.id, account);
        Ok(())
    }

    /// Current durable copy, bypassing the outage switch.
    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts.read().ok()?.get(&id).cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.write() {
            *flag = unavailable;
        }
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.read().map_err(|_| poisoned())? {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl AccountStore for InMemoryAccountStore {
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.ensure_available()?;
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(&id).cloned())
    }

    fn find_id_by_login_name(&self, login_name: &str) -> Result<Option<AccountId>, StoreError> {
        self.ensure_available()?;
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts
            .values()
            .find(|a| a.login_name == login_name)
            .map(|a| a.id))
    }

    fn apply(&self, id: AccountId, updates: &[AccountUpdate]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        for update in updates {
            update.apply(account);
        }
        Ok(())
    }

    fn increment_failed_attempts(&self, id: AccountId) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.failed_attempts = account.failed_attempts.saturating_add(1);
        Ok(())
    }
}

/// In-memory API key store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ApiKeyRecord) -> Result<(), StoreError> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        keys.insert(record.key_hash.clone(), record);
        Ok(())
    }
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(keys.get(key_hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccountStatus;

    #[test]
    fn apply_writes_every_update() {
        let store = InMemoryAccountStore::new();
        let account = Account::pending("pilot", "Pilot");
        let id = account.id;
        store.insert(account).unwrap();

        store
            .apply(
                id,
                &[
                    AccountUpdate::SetStatus(AccountStatus::Active),
                    AccountUpdate::SetPasswordHash("h".to_string()),
                ],
            )
            .unwrap();

        let stored = store.get(id).unwrap();
        assert_eq!(stored.status, AccountStatus::Active);
        assert_eq!(stored.password_hash.as_deref(), Some("h"));
    }

    #[test]
    fn lookups_by_login_name() {
        let store = InMemoryAccountStore::new();
        let account = Account::pending("pilot", "Pilot");
        let id = account.id;
        store.insert(account).unwrap();

        assert_eq!(store.find_id_by_login_name("pilot").unwrap(), Some(id));
        assert_eq!(store.find_id_by_login_name("nobody").unwrap(), None);
    }

    #[test]
    fn missing_accounts_cannot_be_mutated() {
        let store = InMemoryAccountStore::new();
        assert_eq!(
            store.increment_failed_attempts(AccountId::new()),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn outage_switch_fails_every_call() {
        let store = InMemoryAccountStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.find_by_id(AccountId::new()),
            Err(StoreError::Unavailable(_))
        ));
    }
}
