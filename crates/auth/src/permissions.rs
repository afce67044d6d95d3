use serde::{Deserialize, Serialize};

/// Permission level granted on a module.
///
/// Totally ordered: `None < Access < Edit`. Every check compares a granted
/// level against a required threshold, so holding `Edit` always implies
/// `Access`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Access,
    Edit,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 3] = [
        PermissionLevel::None,
        PermissionLevel::Access,
        PermissionLevel::Edit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Access => "access",
            PermissionLevel::Edit => "edit",
        }
    }

    /// Lenient decode used for stored role maps: names or the numeric codes
    /// 0/1/2. Anything else is `None`.
    pub fn from_stored(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "access" | "read" => PermissionLevel::Access,
                "edit" | "write" => PermissionLevel::Edit,
                _ => PermissionLevel::None,
            },
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(1) => PermissionLevel::Access,
                Some(2) => PermissionLevel::Edit,
                _ => PermissionLevel::None,
            },
            _ => PermissionLevel::None,
        }
    }
}

impl core::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(PermissionLevel::None < PermissionLevel::Access);
        assert!(PermissionLevel::Access < PermissionLevel::Edit);
    }

    #[test]
    fn stored_values_decode_leniently() {
        assert_eq!(PermissionLevel::from_stored(&json!("EDIT")), PermissionLevel::Edit);
        assert_eq!(PermissionLevel::from_stored(&json!(1)), PermissionLevel::Access);
        assert_eq!(PermissionLevel::from_stored(&json!(7)), PermissionLevel::None);
        assert_eq!(PermissionLevel::from_stored(&json!(null)), PermissionLevel::None);
        assert_eq!(PermissionLevel::from_stored(&json!("admin")), PermissionLevel::None);
    }
}
