//! Postgres-backed account and API key stores.
//!
//! The store traits are synchronous; queries run on the current tokio runtime
//! via `Handle::block_on`, so callers must be inside a runtime context on a
//! thread that may block (`spawn_blocking`).
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | `ColumnDecode`, `ColumnNotFound`, `Decode` | `Malformed` |
//! | anything else | `Query` |
//!
//! Schema: `migrations/0001_accounts.sql`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use quayside_auth::{
    Account, AccountStatus, AccountStore, AccountUpdate, ApiKeyRecord, ApiKeyStatus, ApiKeyStore,
    History, RoleMap, StoreError,
};
use quayside_core::AccountId;

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => {
            StoreError::Malformed(format!("undecodable row in {operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            StoreError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        other => StoreError::Query(format!("sqlx error in {operation}: {other}")),
    }
}

fn runtime() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Unavailable(
            "postgres store requires a tokio runtime context (call from spawn_blocking)"
                .to_string(),
        )
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Rows
// ─────────────────────────────────────────────────────────────────────────────

/// Raw `accounts` row, before domain validation.
#[derive(Debug, Clone)]
struct AccountRow {
    id: uuid::Uuid,
    login_name: String,
    password_hash: Option<String>,
    can_login: bool,
    display_name: String,
    failed_attempts: i32,
    last_login_at: Option<DateTime<Utc>>,
    status: String,
    roles: serde_json::Value,
    history: String,
    comments: String,
}

impl AccountRow {
    fn from_pg(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            login_name: row.try_get("login_name")?,
            password_hash: row.try_get("password_hash")?,
            can_login: row.try_get("can_login")?,
            display_name: row.try_get("display_name")?,
            failed_attempts: row.try_get("failed_attempts")?,
            last_login_at: row.try_get("last_login_at")?,
            status: row.try_get("status")?,
            roles: row.try_get("roles")?,
            history: row.try_get("history")?,
            comments: row.try_get("comments")?,
        })
    }

    fn into_account(self) -> Result<Account, StoreError> {
        let status = AccountStatus::try_from(self.status.as_str())?;
        let failed_attempts = u32::try_from(self.failed_attempts).map_err(|_| {
            StoreError::Malformed(format!("negative failed_attempts ({})", self.failed_attempts))
        })?;

        Ok(Account {
            id: AccountId::from_uuid(self.id),
            login_name: self.login_name,
            password_hash: self.password_hash.filter(|h| !h.is_empty()),
            can_login: self.can_login,
            display_name: self.display_name,
            failed_attempts,
            last_login_at: self.last_login_at,
            status,
            roles: RoleMap::from_stored(&self.roles.to_string()),
            history: History::from_text(self.history),
            comments: self.comments,
        })
    }
}

/// Column assignments of one `apply` call, folded so each column is set once.
#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnChanges {
    password_hash: Option<String>,
    status: Option<AccountStatus>,
    reset_failed_attempts: bool,
    last_login_at: Option<DateTime<Utc>>,
    history_lines: Vec<String>,
}

impl ColumnChanges {
    fn fold(updates: &[AccountUpdate]) -> Self {
        let mut changes = Self::default();
        for update in updates {
            match update {
                AccountUpdate::SetPasswordHash(hash) => changes.password_hash = Some(hash.clone()),
                AccountUpdate::SetStatus(status) => changes.status = Some(*status),
                AccountUpdate::ResetFailedAttempts => changes.reset_failed_attempts = true,
                AccountUpdate::SetLastLogin(at) => changes.last_login_at = Some(*at),
                AccountUpdate::AppendHistory(line) => changes.history_lines.push(line.clone()),
            }
        }
        changes
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `UPDATE accounts SET ... WHERE id = $n`
    fn into_query(self, id: AccountId) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE accounts SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(hash) = self.password_hash {
                set.push("password_hash = ");
                set.push_bind_unseparated(hash);
            }
            if let Some(status) = self.status {
                set.push("status = ");
                set.push_bind_unseparated(status.as_code());
            }
            if self.reset_failed_attempts {
                set.push("failed_attempts = 0");
            }
            if let Some(at) = self.last_login_at {
                set.push("last_login_at = ");
                set.push_bind_unseparated(at);
            }
            if !self.history_lines.is_empty() {
                let appended = self.history_lines.join("\n");
                set.push("history = CASE WHEN history = '' THEN ");
                set.push_bind_unseparated(appended.clone());
                set.push_unseparated(" ELSE history || chr(10) || ");
                set.push_bind_unseparated(appended);
                set.push_unseparated(" END");
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(*id.as_uuid());
        qb
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

const SELECT_ACCOUNT: &str = r#"
    SELECT
        id,
        login_name,
        password_hash,
        can_login,
        display_name,
        failed_attempts,
        last_login_at,
        status,
        roles,
        history,
        comments
    FROM accounts
"#;

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.map(|row| {
            AccountRow::from_pg(&row)
                .map_err(|e| map_sqlx_error("find_by_id", e))?
                .into_account()
        })
        .transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_id_by_login_name(
        &self,
        login_name: &str,
    ) -> Result<Option<AccountId>, StoreError> {
        let row = sqlx::query("SELECT id FROM accounts WHERE login_name = $1")
            .bind(login_name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_id_by_login_name", e))?;

        row.map(|row| {
            row.try_get::<uuid::Uuid, _>("id")
                .map(AccountId::from_uuid)
                .map_err(|e| map_sqlx_error("find_id_by_login_name", e))
        })
        .transpose()
    }

    // Updates carry password hashes; keep them out of spans.
    #[instrument(skip(self, updates), fields(updates = updates.len()), err)]
    pub async fn apply_updates(
        &self,
        id: AccountId,
        updates: &[AccountUpdate],
    ) -> Result<(), StoreError> {
        let changes = ColumnChanges::fold(updates);
        if changes.is_empty() {
            return Ok(());
        }

        let mut query = changes.into_query(id);
        let result = query
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn bump_failed_attempts(&self, id: AccountId) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE accounts SET failed_attempts = failed_attempts + 1 WHERE id = $1")
                .bind(*id.as_uuid())
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("increment_failed_attempts", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl AccountStore for PostgresAccountStore {
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        runtime()?.block_on(self.fetch_by_id(id))
    }

    fn find_id_by_login_name(&self, login_name: &str) -> Result<Option<AccountId>, StoreError> {
        runtime()?.block_on(self.fetch_id_by_login_name(login_name))
    }

    fn apply(&self, id: AccountId, updates: &[AccountUpdate]) -> Result<(), StoreError> {
        runtime()?.block_on(self.apply_updates(id, updates))
    }

    fn increment_failed_attempts(&self, id: AccountId) -> Result<(), StoreError> {
        runtime()?.block_on(self.bump_failed_attempts(id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API keys
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresApiKeyStore {
    pool: Arc<PgPool>,
}

impl PostgresApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    // The hash is not secret, but keep spans free of key material anyway.
    #[instrument(skip_all, err)]
    pub async fn fetch_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT key_hash, owner_id, status, expires_at FROM api_keys WHERE key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_hash", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |e| map_sqlx_error("find_by_hash", e);
        let status: String = row.try_get("status").map_err(decode)?;
        Ok(Some(ApiKeyRecord {
            key_hash: row.try_get("key_hash").map_err(decode)?,
            owner: AccountId::from_uuid(row.try_get("owner_id").map_err(decode)?),
            status: ApiKeyStatus::from_code(&status),
            expires_at: row.try_get("expires_at").map_err(decode)?,
        }))
    }
}

impl ApiKeyStore for PostgresApiKeyStore {
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        runtime()?.block_on(self.fetch_by_hash(key_hash))
    }
}
