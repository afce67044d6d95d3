use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::PermissionLevel;

/// Back-office module a permission level is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Timber,
    Bulk,
    /// Vessel calls and consignation.
    Consignation,
    Chartering,
    Invoicing,
    Reports,
    Settings,
    Users,
    /// Self-service area (own profile, own password). Open to every
    /// authenticated account.
    Profile,
}

impl Module {
    pub const ALL: [Module; 9] = [
        Module::Timber,
        Module::Bulk,
        Module::Consignation,
        Module::Chartering,
        Module::Invoicing,
        Module::Reports,
        Module::Settings,
        Module::Users,
        Module::Profile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Timber => "timber",
            Module::Bulk => "bulk",
            Module::Consignation => "consignation",
            Module::Chartering => "chartering",
            Module::Invoicing => "invoicing",
            Module::Reports => "reports",
            Module::Settings => "settings",
            Module::Users => "users",
            Module::Profile => "profile",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Module::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    pub fn is_self_service(&self) -> bool {
        matches!(self, Module::Profile)
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module → permission level mapping of an account.
///
/// Missing modules are `PermissionLevel::None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleMap(BTreeMap<Module, PermissionLevel>);

impl RoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: Module, level: PermissionLevel) -> Self {
        self.set(module, level);
        self
    }

    pub fn set(&mut self, module: Module, level: PermissionLevel) {
        if level == PermissionLevel::None {
            self.0.remove(&module);
        } else {
            self.0.insert(module, level);
        }
    }

    pub fn level(&self, module: Module) -> PermissionLevel {
        self.0.get(&module).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Module, PermissionLevel)> + '_ {
        self.0.iter().map(|(m, l)| (*m, *l))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Storage encoding: a JSON object keyed by module name.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Decode a stored role map.
    ///
    /// Never fails: unknown modules are dropped, unknown levels become `None`,
    /// and anything that is not a JSON object yields an empty map.
    pub fn from_stored(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        let parsed: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!(error = %e, "stored role map is not a JSON object; treating as empty");
                return Self::default();
            }
        };

        let mut roles = Self::default();
        for (name, value) in &parsed {
            match Module::parse(name) {
                Some(module) => roles.set(module, PermissionLevel::from_stored(value)),
                None => tracing::debug!(module = %name, "ignoring unknown module in stored role map"),
            }
        }
        roles
    }
}

impl FromIterator<(Module, PermissionLevel)> for RoleMap {
    fn from_iter<I: IntoIterator<Item = (Module, PermissionLevel)>>(iter: I) -> Self {
        let mut roles = RoleMap::default();
        for (module, level) in iter {
            roles.set(module, level);
        }
        roles
    }
}

impl<'de> Deserialize<'de> for RoleMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(RoleMap::from_stored(&value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn unknown_modules_default_to_none() {
        let roles = RoleMap::from_stored(r#"{"timber":"edit","warehouse":"edit","bulk":1}"#);
        assert_eq!(roles.level(Module::Timber), PermissionLevel::Edit);
        assert_eq!(roles.level(Module::Bulk), PermissionLevel::Access);
        assert_eq!(roles.level(Module::Chartering), PermissionLevel::None);
        assert_eq!(roles.iter().count(), 2);
    }

    #[test]
    fn garbage_decodes_to_empty() {
        assert!(RoleMap::from_stored("[1,2,3]").is_empty());
        assert!(RoleMap::from_stored("not json").is_empty());
        assert!(RoleMap::from_stored("").is_empty());
    }

    #[test]
    fn encoding_is_ordered_and_readable() {
        let roles = RoleMap::new()
            .with(Module::Users, PermissionLevel::Access)
            .with(Module::Timber, PermissionLevel::Edit);
        assert_eq!(roles.to_json(), r#"{"timber":"edit","users":"access"}"#);
        assert_eq!(RoleMap::from_stored(&roles.to_json()), roles);
    }

    #[test]
    fn setting_none_removes_the_entry() {
        let mut roles = RoleMap::new().with(Module::Bulk, PermissionLevel::Edit);
        roles.set(Module::Bulk, PermissionLevel::None);
        assert!(roles.is_empty());
    }

    proptest! {
        #[test]
        fn decoding_arbitrary_text_never_panics(raw in ".{0,64}") {
            let _ = RoleMap::from_stored(&raw);
        }
    }
}
