//! Request/response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quayside_auth::{Account, Module, PermissionLevel, can_access, can_edit};

use crate::context::AuthMethod;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub login: String,
    pub new_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessQuery {
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleAccess {
    pub module: &'static str,
    pub access: bool,
    pub edit: bool,
}

impl ModuleAccess {
    pub fn for_account(account: &Account, module: Module) -> Self {
        Self {
            module: module.as_str(),
            access: can_access(account, module),
            edit: can_edit(account, module),
        }
    }
}

/// Public view of an account. Never carries the password hash or history.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub login_name: String,
    pub display_name: String,
    pub status: &'static str,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated_via: Option<&'static str>,
    pub modules: Vec<ModuleAccess>,
}

impl AccountSummary {
    pub fn from_account(account: &Account, via: Option<AuthMethod>) -> Self {
        Self {
            id: account.id.to_string(),
            login_name: account.login_name.clone(),
            display_name: account.display_name.clone(),
            status: account.status.as_code(),
            last_login_at: account.last_login_at,
            authenticated_via: via.map(|m| m.as_str()),
            modules: Module::ALL
                .into_iter()
                .map(|m| ModuleAccess::for_account(account, m))
                .collect(),
        }
    }
}

/// `access` (default) or `edit`.
pub fn parse_required_level(raw: Option<&str>) -> Option<PermissionLevel> {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        None => Some(PermissionLevel::Access),
        Some(s) => match s.as_str() {
            "" | "access" => Some(PermissionLevel::Access),
            "edit" => Some(PermissionLevel::Edit),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use quayside_auth::{AccountStatus, RoleMap};

    use super::*;

    #[test]
    fn summary_lists_every_module_with_flags() {
        let mut account = Account::pending("clerk", "Clerk");
        account.status = AccountStatus::Active;
        account.password_hash = Some("$argon2id$secret".into());
        account.roles = RoleMap::new()
            .with(Module::Timber, PermissionLevel::Edit)
            .with(Module::Reports, PermissionLevel::Access);

        let summary = AccountSummary::from_account(&account, Some(AuthMethod::Session));
        assert_eq!(summary.modules.len(), Module::ALL.len());

        let timber = summary.modules.iter().find(|m| m.module == "timber").unwrap();
        assert!(timber.access && timber.edit);
        let reports = summary.modules.iter().find(|m| m.module == "reports").unwrap();
        assert!(reports.access && !reports.edit);
        let profile = summary.modules.iter().find(|m| m.module == "profile").unwrap();
        assert!(profile.access);

        let body = serde_json::to_string(&summary).unwrap();
        assert!(!body.contains("argon2"));
        assert!(body.contains("\"authenticated_via\":\"session\""));
    }

    #[test]
    fn required_level_defaults_to_access() {
        assert_eq!(parse_required_level(None), Some(PermissionLevel::Access));
        assert_eq!(parse_required_level(Some("EDIT")), Some(PermissionLevel::Edit));
        assert_eq!(parse_required_level(Some("admin")), None);
    }
}
