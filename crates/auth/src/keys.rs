//! Cache key layout.
//!
//! ```text
//! {prefix}:session:{token}     -> account id              (TTL: session lifetime)
//! {prefix}:account:{id}        -> account projection hash (TTL: session lifetime)
//! {prefix}:apikey:{key hash}   -> api key record hash     (TTL: api key cache lifetime)
//! {prefix}:ratelimit:{addr}    -> counter                 (TTL: sliding window)
//! {prefix}:blocked:{addr}      -> "1"                     (TTL: block duration)
//! ```

use std::net::IpAddr;

use quayside_core::AccountId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new("quayside")
    }
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn session(&self, token: &str) -> String {
        format!("{}:session:{token}", self.prefix)
    }

    /// Glob matching every session key.
    pub fn session_pattern(&self) -> String {
        format!("{}:session:*", self.prefix)
    }

    pub fn account(&self, id: AccountId) -> String {
        format!("{}:account:{id}", self.prefix)
    }

    pub fn api_key(&self, key_hash: &str) -> String {
        format!("{}:apikey:{key_hash}", self.prefix)
    }

    pub fn rate_limit(&self, addr: IpAddr) -> String {
        format!("{}:ratelimit:{addr}", self.prefix)
    }

    pub fn blocked(&self, addr: IpAddr) -> String {
        format!("{}:blocked:{addr}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_prefix() {
        let keys = CacheKeys::new("qs");
        let addr: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(keys.rate_limit(addr), "qs:ratelimit:10.0.0.7");
        assert_eq!(keys.blocked(addr), "qs:blocked:10.0.0.7");
        assert_eq!(keys.session("abc"), "qs:session:abc");
        assert_eq!(keys.session_pattern(), "qs:session:*");
        assert!(keys.api_key("ff00").starts_with("qs:apikey:"));
    }
}
