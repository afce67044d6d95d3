//! Two-tier authorization mechanism.
//!
//! Which module guards which screen is decided by the callers; this module
//! only compares an account's granted level against a required threshold.

use thiserror::Error;

use crate::{Account, Module, PermissionLevel};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: '{module}' requires {required}")]
    Forbidden {
        module: Module,
        required: PermissionLevel,
    },
}

/// True for the self-service module, otherwise `roles[module] >= Access`.
pub fn can_access(account: &Account, module: Module) -> bool {
    module.is_self_service() || account.roles.level(module) >= PermissionLevel::Access
}

/// True iff `roles[module] >= Edit`.
pub fn can_edit(account: &Account, module: Module) -> bool {
    account.roles.level(module) >= PermissionLevel::Edit
}

/// `?`-friendly form of [`can_access`] / [`can_edit`].
pub fn require_level(
    account: &Account,
    module: Module,
    required: PermissionLevel,
) -> Result<(), AuthzError> {
    let granted = match required {
        PermissionLevel::None => true,
        PermissionLevel::Access => can_access(account, module),
        PermissionLevel::Edit => can_edit(account, module),
    };

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { module, required })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{AccountStatus, RoleMap};

    fn account_with(roles: RoleMap) -> Account {
        let mut account = Account::pending("clerk", "Clerk");
        account.status = AccountStatus::Active;
        account.roles = roles;
        account
    }

    #[test]
    fn self_service_is_always_accessible() {
        let account = account_with(RoleMap::new());
        assert!(can_access(&account, Module::Profile));
        assert!(!can_edit(&account, Module::Profile));
        assert!(!can_access(&account, Module::Timber));
    }

    #[test]
    fn access_and_edit_follow_the_level() {
        let account = account_with(
            RoleMap::new()
                .with(Module::Bulk, PermissionLevel::Access)
                .with(Module::Chartering, PermissionLevel::Edit),
        );

        assert!(can_access(&account, Module::Bulk));
        assert!(!can_edit(&account, Module::Bulk));
        assert!(can_access(&account, Module::Chartering));
        assert!(can_edit(&account, Module::Chartering));
    }

    #[test]
    fn require_level_reports_what_was_missing() {
        let account = account_with(RoleMap::new().with(Module::Bulk, PermissionLevel::Access));

        assert!(require_level(&account, Module::Bulk, PermissionLevel::Access).is_ok());
        assert_eq!(
            require_level(&account, Module::Bulk, PermissionLevel::Edit),
            Err(AuthzError::Forbidden {
                module: Module::Bulk,
                required: PermissionLevel::Edit,
            })
        );
        assert!(require_level(&account, Module::Users, PermissionLevel::None).is_ok());
    }

    fn arb_level() -> impl Strategy<Value = PermissionLevel> {
        prop::sample::select(PermissionLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn edit_implies_access(levels in prop::collection::vec(arb_level(), Module::ALL.len())) {
            let roles: RoleMap = Module::ALL.into_iter().zip(levels).collect();
            let account = account_with(roles);

            for module in Module::ALL {
                if can_edit(&account, module) {
                    prop_assert!(can_access(&account, module));
                }
            }
        }
    }
}
