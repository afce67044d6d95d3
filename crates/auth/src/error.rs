//! Typed failures of the authentication core.
//!
//! Every operation returns one of these instead of a bare string so the
//! calling layer can map it deterministically to a transport response.

use thiserror::Error;

use crate::CookieAction;

/// Failure talking to the cache service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache command error: {0}")]
    Command(String),
}

/// Failure talking to (or decoding from) the durable store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("record not found")]
    NotFound,

    /// A stored status code is not one of the known states.
    #[error("unknown account status code '{0}'")]
    UnknownStatus(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<crate::account::UnknownStatus> for StoreError {
    fn from(value: crate::account::UnknownStatus) -> Self {
        StoreError::UnknownStatus(value.0)
    }
}

/// Broad class of a failure, used by callers that only need to know how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected; the caller can choose another action (re-login, activation).
    Client,
    /// Expected but terminal for the account until an administrator steps in.
    Security,
    /// Cache or store unavailable; fatal for the request.
    Infrastructure,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is pending activation")]
    AccountPending,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account is locked")]
    AccountLocked,

    #[error("account status does not allow this operation")]
    AccountStatusError,

    #[error("no session token presented")]
    SessionMissing,

    #[error("session is invalid or expired")]
    SessionInvalid,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("secret rejected: {0}")]
    SecretRejected(String),

    #[error("too many failed login attempts")]
    MaxAttemptsExceeded,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("secret hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::InvalidCredentials
            | AuthError::AccountPending
            | AuthError::AccountInactive
            | AuthError::AccountLocked
            | AuthError::AccountStatusError
            | AuthError::SessionMissing
            | AuthError::SessionInvalid
            | AuthError::InvalidApiKey
            | AuthError::SecretRejected(_) => ErrorClass::Client,
            AuthError::MaxAttemptsExceeded => ErrorClass::Security,
            AuthError::Cache(_) | AuthError::Store(_) | AuthError::Hashing(_) => {
                ErrorClass::Infrastructure
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountPending => "account_pending",
            AuthError::AccountInactive => "account_inactive",
            AuthError::AccountLocked => "account_locked",
            AuthError::AccountStatusError => "account_status_error",
            AuthError::SessionMissing => "session_missing",
            AuthError::SessionInvalid => "session_invalid",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::SecretRejected(_) => "secret_rejected",
            AuthError::MaxAttemptsExceeded => "max_attempts_exceeded",
            AuthError::Cache(_) => "cache_unavailable",
            AuthError::Store(_) => "store_unavailable",
            AuthError::Hashing(_) => "hashing_failed",
        }
    }

    /// What the caller must do with the session cookie after this failure.
    pub fn cookie_action(&self) -> CookieAction {
        match self {
            AuthError::SessionInvalid => CookieAction::Clear,
            _ => CookieAction::Keep,
        }
    }
}
