//! API keys for machine-to-machine access.
//!
//! Keys are never stored in the clear: the lookup key is the hex SHA-256
//! digest of the presented key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use quayside_core::AccountId;

use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}

impl ApiKeyStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            ApiKeyStatus::Active => "active",
            ApiKeyStatus::Revoked => "revoked",
        }
    }

    /// Anything other than `active` counts as revoked.
    pub fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("active") {
            ApiKeyStatus::Active
        } else {
            ApiKeyStatus::Revoked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub key_hash: String,
    pub owner: AccountId,
    pub status: ApiKeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Usable right now: active and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == ApiKeyStatus::Active && self.expires_at.is_none_or(|at| at > now)
    }

    pub(crate) fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("owner".to_string(), self.owner.to_string()),
            ("status".to_string(), self.status.as_code().to_string()),
            (
                "expires_at".to_string(),
                self.expires_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            ),
        ]
    }

    pub(crate) fn from_fields(
        key_hash: &str,
        fields: &HashMap<String, String>,
    ) -> Result<Self, StoreError> {
        let owner = fields
            .get("owner")
            .ok_or_else(|| StoreError::Malformed("api key projection lacks owner".to_string()))?
            .parse::<AccountId>()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let status = fields
            .get("status")
            .map(|s| ApiKeyStatus::from_code(s))
            .ok_or_else(|| StoreError::Malformed("api key projection lacks status".to_string()))?;
        let expires_at = match fields.get("expires_at").map(String::as_str) {
            None | Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| StoreError::Malformed(format!("expires_at: {e}")))?
                    .with_timezone(&Utc),
            ),
        };

        Ok(Self {
            key_hash: key_hash.to_string(),
            owner,
            status,
            expires_at,
        })
    }
}

/// Hex-encoded SHA-256 of the presented key.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn usability_checks_status_and_expiry() {
        let now = Utc::now();
        let mut record = ApiKeyRecord {
            key_hash: hash_api_key("k"),
            owner: AccountId::new(),
            status: ApiKeyStatus::Active,
            expires_at: None,
        };
        assert!(record.is_usable(now));

        record.expires_at = Some(now - Duration::seconds(1));
        assert!(!record.is_usable(now));

        record.expires_at = Some(now + Duration::days(1));
        record.status = ApiKeyStatus::Revoked;
        assert!(!record.is_usable(now));
    }

    #[test]
    fn projection_survives_the_cache() {
        let record = ApiKeyRecord {
            key_hash: "h".to_string(),
            owner: AccountId::new(),
            status: ApiKeyStatus::Active,
            expires_at: Some(Utc::now()),
        };
        let fields: HashMap<String, String> = record.to_fields().into_iter().collect();
        let back = ApiKeyRecord::from_fields("h", &fields).unwrap();
        assert_eq!(back.owner, record.owner);
        assert_eq!(back.status, record.status);
        assert!(back.expires_at.is_some());
    }

    #[test]
    fn projection_without_owner_is_malformed() {
        let fields = HashMap::from([("status".to_string(), "active".to_string())]);
        assert!(matches!(
            ApiKeyRecord::from_fields("h", &fields),
            Err(StoreError::Malformed(_))
        ));
    }
}
