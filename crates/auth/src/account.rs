//! Account record, status machine states and the mutations applied to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quayside_core::AccountId;

use crate::RoleMap;

// ─────────────────────────────────────────────────────────────────────────────
// Account Status
// ─────────────────────────────────────────────────────────────────────────────

/// Account status.
///
/// `Pending --activate--> Active`; `{Pending, Active} --too many failures--> Locked`.
/// `Inactive` and unlocking are administrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Provisioned, no password yet.
    Pending,
    Active,
    Inactive,
    Locked,
}

impl AccountStatus {
    /// Storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Locked => "locked",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown account status code '{0}'")]
pub struct UnknownStatus(pub String);

impl TryFrom<&str> for AccountStatus {
    type Error = UnknownStatus;

    fn try_from(code: &str) -> Result<Self, Self::Error> {
        match code.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "locked" => Ok(AccountStatus::Locked),
            _ => Err(UnknownStatus(code.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only, timestamped text log kept on the account.
///
/// One entry per line: `"<YYYY-MM-DD HH:MM:SS> <text>"` (UTC).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(String);

impl History {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Render the line that [`History::append`] would add.
    pub fn line(at: DateTime<Utc>, text: &str) -> String {
        // Entries are single lines.
        let text = text.replace(['\r', '\n'], " ");
        format!("{} {}", at.format("%Y-%m-%d %H:%M:%S"), text.trim())
    }

    pub fn append(&mut self, at: DateTime<Utc>, text: &str) -> String {
        let line = Self::line(at, text);
        self.push_line(&line);
        line
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        if !self.0.is_empty() && !self.0.ends_with('\n') {
            self.0.push('\n');
        }
        self.0.push_str(line);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.lines().filter(|l| !l.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

/// Identity and credential record.
///
/// # Invariants
/// - `password_hash` is `None` only while `status` is `Pending`, or `Locked`
///   after a never-activated account was locked by failed logins.
/// - `failed_attempts` is reset to 0 by every successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub login_name: String,
    pub password_hash: Option<String>,
    /// `false` for display-only (kiosk) identities.
    pub can_login: bool,
    pub display_name: String,
    pub failed_attempts: u32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub status: AccountStatus,
    pub roles: RoleMap,
    pub history: History,
    pub comments: String,
}

impl Account {
    /// A freshly provisioned, login-capable account awaiting activation.
    pub fn pending(login_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(),
            login_name: login_name.into(),
            password_hash: None,
            can_login: true,
            display_name: display_name.into(),
            failed_attempts: 0,
            last_login_at: None,
            status: AccountStatus::Pending,
            roles: RoleMap::default(),
            history: History::default(),
            comments: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────────────────────────

/// A single write-through mutation of an account.
///
/// The failed-attempt increment is deliberately absent: it goes through the
/// dedicated atomic path instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpdate {
    SetPasswordHash(String),
    SetStatus(AccountStatus),
    ResetFailedAttempts,
    SetLastLogin(DateTime<Utc>),
    /// A fully rendered history line (see [`History::line`]).
    AppendHistory(String),
}

impl AccountUpdate {
    pub fn apply(&self, account: &mut Account) {
        match self {
            AccountUpdate::SetPasswordHash(hash) => account.password_hash = Some(hash.clone()),
            AccountUpdate::SetStatus(status) => account.status = *status,
            AccountUpdate::ResetFailedAttempts => account.failed_attempts = 0,
            AccountUpdate::SetLastLogin(at) => account.last_login_at = Some(*at),
            AccountUpdate::AppendHistory(line) => account.history.push_line(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn status_parse_is_strict() {
        assert_eq!(AccountStatus::try_from("ACTIVE"), Ok(AccountStatus::Active));
        assert_eq!(AccountStatus::try_from(" locked "), Ok(AccountStatus::Locked));
        assert_eq!(
            AccountStatus::try_from("suspended"),
            Err(UnknownStatus("suspended".to_string()))
        );
    }

    #[test]
    fn history_appends_stamped_lines() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let mut history = History::default();
        history.append(at, "account activated");
        history.append(at, "locked\nby admin");

        let entries: Vec<&str> = history.entries().collect();
        assert_eq!(
            entries,
            vec![
                "2024-03-01 08:30:00 account activated",
                "2024-03-01 08:30:00 locked by admin",
            ]
        );
    }

    #[test]
    fn updates_mutate_the_matching_field() {
        let mut account = Account::pending("harbour.master", "Harbour Master");
        account.failed_attempts = 3;
        let at = Utc::now();

        for update in [
            AccountUpdate::SetPasswordHash("$argon2id$stub".to_string()),
            AccountUpdate::SetStatus(AccountStatus::Active),
            AccountUpdate::ResetFailedAttempts,
            AccountUpdate::SetLastLogin(at),
            AccountUpdate::AppendHistory("2024-01-01 00:00:00 hello".to_string()),
        ] {
            update.apply(&mut account);
        }

        assert_eq!(account.password_hash.as_deref(), Some("$argon2id$stub"));
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.failed_attempts, 0);
        assert_eq!(account.last_login_at, Some(at));
        assert_eq!(account.history.len(), 1);
    }
}
