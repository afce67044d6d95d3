use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quayside_core::AccountId;

/// Which transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountChangeKind {
    Activated,
    Locked,
}

impl AccountChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountChangeKind::Activated => "account.activated",
            AccountChangeKind::Locked => "account.locked",
        }
    }
}

impl core::fmt::Display for AccountChangeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Account changed" message handed to listeners after a status transition
/// has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChange {
    pub account_id: AccountId,
    pub kind: AccountChangeKind,
    pub occurred_at: DateTime<Utc>,
}

impl AccountChange {
    pub fn new(account_id: AccountId, kind: AccountChangeKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            kind,
            occurred_at,
        }
    }

    pub fn activated(account_id: AccountId, occurred_at: DateTime<Utc>) -> Self {
        Self::new(account_id, AccountChangeKind::Activated, occurred_at)
    }

    pub fn locked(account_id: AccountId, occurred_at: DateTime<Utc>) -> Self {
        Self::new(account_id, AccountChangeKind::Locked, occurred_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_in_snake_case() {
        let change = AccountChange::locked(AccountId::new(), Utc::now());
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], "locked");

        let back: AccountChange = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }
}
