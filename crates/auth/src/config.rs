//! Tunables of the authentication core.
//!
//! Defaults are the production values. `AuthConfig::from_env` overlays
//! `QUAYSIDE_*` variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QUAYSIDE_MAX_FAILED_ATTEMPTS` | `max_failed_attempts` |
//! | `QUAYSIDE_SESSION_TTL_SECS` | `session_ttl` |
//! | `QUAYSIDE_RATE_LIMIT_THRESHOLD` | `rate_limit_threshold` |
//! | `QUAYSIDE_RATE_LIMIT_WINDOW_SECS` | `rate_limit_window` |
//! | `QUAYSIDE_BLOCK_DURATION_SECS` | `block_duration` |
//! | `QUAYSIDE_RESPONSE_DELAY_MS` | `response_delay` |
//! | `QUAYSIDE_API_KEY_CACHE_TTL_SECS` | `api_key_cache_ttl` |
//! | `QUAYSIDE_MIN_SECRET_LEN` | `min_secret_len` |
//! | `QUAYSIDE_COOKIE_NAME` / `QUAYSIDE_COOKIE_PATH` | cookie name / path |
//! | `QUAYSIDE_ENV` | `development` turns `secure_cookies` off |
//! | `QUAYSIDE_SECURE_COOKIES` | explicit override of `secure_cookies` |
//! | `QUAYSIDE_CACHE_PREFIX` | `cache_prefix` |
//! | `QUAYSIDE_ARGON2_MEMORY_KIB` / `_ITERATIONS` / `_PARALLELISM` | hashing cost |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::{CacheKeys, CookiePolicy, GatePolicy, HashingPolicy, LoginPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub max_failed_attempts: u32,
    pub session_ttl: Duration,
    pub rate_limit_threshold: u32,
    pub rate_limit_window: Duration,
    pub block_duration: Duration,
    pub response_delay: Duration,
    pub api_key_cache_ttl: Duration,
    pub min_secret_len: usize,
    pub cookie_name: String,
    pub cookie_path: String,
    pub secure_cookies: bool,
    pub cache_prefix: String,
    pub hashing: HashingPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let gate = GatePolicy::default();
        let login = LoginPolicy::default();
        let cookie = CookiePolicy::default();
        Self {
            max_failed_attempts: login.max_failed_attempts,
            session_ttl: login.session_ttl,
            rate_limit_threshold: gate.threshold,
            rate_limit_window: gate.window,
            block_duration: gate.block,
            response_delay: gate.delay,
            api_key_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            min_secret_len: login.min_secret_len,
            cookie_name: cookie.name,
            cookie_path: cookie.path,
            secure_cookies: cookie.secure,
            cache_prefix: CacheKeys::default().prefix().to_string(),
            hashing: HashingPolicy::default(),
        }
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Overlay values from `lookup` (variable name → raw value) over the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let secs = |var: &'static str| -> Result<Option<Duration>, ConfigError> {
            lookup(var)
                .map(|raw| parse::<u64>(var, &raw).map(Duration::from_secs))
                .transpose()
        };

        if let Some(raw) = lookup("QUAYSIDE_MAX_FAILED_ATTEMPTS") {
            config.max_failed_attempts = parse("QUAYSIDE_MAX_FAILED_ATTEMPTS", &raw)?;
        }
        if let Some(ttl) = secs("QUAYSIDE_SESSION_TTL_SECS")? {
            config.session_ttl = ttl;
        }
        if let Some(raw) = lookup("QUAYSIDE_RATE_LIMIT_THRESHOLD") {
            config.rate_limit_threshold = parse("QUAYSIDE_RATE_LIMIT_THRESHOLD", &raw)?;
        }
        if let Some(window) = secs("QUAYSIDE_RATE_LIMIT_WINDOW_SECS")? {
            config.rate_limit_window = window;
        }
        if let Some(block) = secs("QUAYSIDE_BLOCK_DURATION_SECS")? {
            config.block_duration = block;
        }
        if let Some(raw) = lookup("QUAYSIDE_RESPONSE_DELAY_MS") {
            config.response_delay =
                Duration::from_millis(parse("QUAYSIDE_RESPONSE_DELAY_MS", &raw)?);
        }
        if let Some(ttl) = secs("QUAYSIDE_API_KEY_CACHE_TTL_SECS")? {
            config.api_key_cache_ttl = ttl;
        }
        if let Some(raw) = lookup("QUAYSIDE_MIN_SECRET_LEN") {
            config.min_secret_len = parse("QUAYSIDE_MIN_SECRET_LEN", &raw)?;
        }
        if let Some(name) = lookup("QUAYSIDE_COOKIE_NAME") {
            config.cookie_name = name;
        }
        if let Some(path) = lookup("QUAYSIDE_COOKIE_PATH") {
            config.cookie_path = path;
        }
        if let Some(env) = lookup("QUAYSIDE_ENV") {
            config.secure_cookies = !env.trim().eq_ignore_ascii_case("development");
        }
        if let Some(raw) = lookup("QUAYSIDE_SECURE_COOKIES") {
            config.secure_cookies = parse_bool("QUAYSIDE_SECURE_COOKIES", &raw)?;
        }
        if let Some(prefix) = lookup("QUAYSIDE_CACHE_PREFIX") {
            config.cache_prefix = prefix;
        }
        if let Some(raw) = lookup("QUAYSIDE_ARGON2_MEMORY_KIB") {
            config.hashing.memory_kib = parse("QUAYSIDE_ARGON2_MEMORY_KIB", &raw)?;
        }
        if let Some(raw) = lookup("QUAYSIDE_ARGON2_ITERATIONS") {
            config.hashing.iterations = parse("QUAYSIDE_ARGON2_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("QUAYSIDE_ARGON2_PARALLELISM") {
            config.hashing.parallelism = parse("QUAYSIDE_ARGON2_PARALLELISM", &raw)?;
        }

        if config.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "QUAYSIDE_MAX_FAILED_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if config.rate_limit_threshold == 0 {
            return Err(ConfigError::Invalid {
                var: "QUAYSIDE_RATE_LIMIT_THRESHOLD",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            threshold: self.rate_limit_threshold,
            window: self.rate_limit_window,
            block: self.block_duration,
            delay: self.response_delay,
        }
    }

    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy {
            max_failed_attempts: self.max_failed_attempts,
            session_ttl: self.session_ttl,
            min_secret_len: self.min_secret_len,
        }
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            name: self.cookie_name.clone(),
            path: self.cookie_path.clone(),
            secure: self.secure_cookies,
        }
    }

    pub fn hashing_policy(&self) -> HashingPolicy {
        self.hashing
    }

    pub fn cache_keys(&self) -> CacheKeys {
        CacheKeys::new(self.cache_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<AuthConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_are_the_production_values() {
        let config = from(&[]).unwrap();
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.session_ttl, Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.rate_limit_threshold, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(10));
        assert_eq!(config.block_duration, Duration::from_secs(15 * 60));
        assert_eq!(config.response_delay, Duration::from_secs(1));
        assert_eq!(config.api_key_cache_ttl, Duration::from_secs(604_800));
        assert_eq!(config.cookie_name, "quayside_session");
        assert!(config.secure_cookies);
        assert_eq!(config.cache_keys().prefix(), "quayside");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = from(&[
            ("QUAYSIDE_MAX_FAILED_ATTEMPTS", "3"),
            ("QUAYSIDE_SESSION_TTL_SECS", "60"),
            ("QUAYSIDE_RESPONSE_DELAY_MS", "0"),
            ("QUAYSIDE_CACHE_PREFIX", "qs-test"),
        ])
        .unwrap();
        assert_eq!(config.login_policy().max_failed_attempts, 3);
        assert_eq!(config.login_policy().session_ttl, Duration::from_secs(60));
        assert_eq!(config.gate_policy().delay, Duration::ZERO);
        assert_eq!(config.cache_keys().prefix(), "qs-test");
    }

    #[test]
    fn development_turns_secure_cookies_off() {
        assert!(!from(&[("QUAYSIDE_ENV", "development")]).unwrap().secure_cookies);
        assert!(from(&[("QUAYSIDE_ENV", "production")]).unwrap().secure_cookies);
        assert!(
            from(&[("QUAYSIDE_ENV", "development"), ("QUAYSIDE_SECURE_COOKIES", "true")])
                .unwrap()
                .cookie_policy()
                .secure
        );
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = from(&[("QUAYSIDE_BLOCK_DURATION_SECS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "QUAYSIDE_BLOCK_DURATION_SECS", .. }
        ));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(from(&[("QUAYSIDE_MAX_FAILED_ATTEMPTS", "0")]).is_err());
    }
}
