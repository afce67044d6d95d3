use quayside_auth::Account;

/// How the caller of a request proved who they are.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Identified account for a request.
///
/// Inserted by `identify_middleware`; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    account: Account,
    method: AuthMethod,
}

impl AccountContext {
    pub fn new(account: Account, method: AuthMethod) -> Self {
        Self { account, method }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }
}
