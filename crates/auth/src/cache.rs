//! Cache client contract and an in-memory implementation.
//!
//! The cache is the fast, write-through mirror of durable records and the
//! atomic counter backend for rate limiting and sessions. Every correctness
//! property under concurrency rests on the atomic primitives below
//! (`incr_ex`, `hincr`, `set_nx_ex`); callers never lock client-side.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use quayside_core::Clock;

use crate::CacheError;

/// Blocking key-value cache with per-key TTL.
pub trait CacheClient: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// SET with expiry.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// SET only if absent, with expiry. Returns whether the key was written.
    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Atomically increment a counter and (re)set its expiry. Returns the new value.
    fn incr_ex(&self, key: &str, ttl: Duration) -> Result<i64, CacheError>;

    /// Reset the expiry of an existing key. Returns `false` if the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Replace a whole hash and set its expiry.
    fn hset_all(&self, key: &str, fields: &[(String, String)], ttl: Duration)
    -> Result<(), CacheError>;

    /// Set individual hash fields, keeping the current expiry.
    fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError>;

    /// All fields of a hash; empty when the key is absent.
    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    /// Atomically increment a hash field. Returns the new value.
    fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64, CacheError>;

    /// Delete a key. Returns whether it existed.
    fn del(&self, key: &str) -> Result<bool, CacheError>;

    /// Keys matching a glob pattern (`*` wildcard).
    fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

impl<C> CacheClient for Arc<C>
where
    C: CacheClient + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        (**self).set_ex(key, value, ttl)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        (**self).set_nx_ex(key, value, ttl)
    }

    fn incr_ex(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        (**self).incr_ex(key, ttl)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        (**self).expire(key, ttl)
    }

    fn hset_all(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        (**self).hset_all(key, fields, ttl)
    }

    fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        (**self).hset(key, fields)
    }

    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        (**self).hgetall(key)
    }

    fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64, CacheError> {
        (**self).hincr(key, field, by)
    }

    fn del(&self, key: &str) -> Result<bool, CacheError> {
        (**self).del(key)
    }

    fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        (**self).scan(pattern)
    }
}

/// Glob match supporting `*` (any run) and `?` (any single char).
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory cache
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory cache for tests/dev.
///
/// Mirrors the Redis semantics the core relies on; expiry is evaluated
/// against the injected clock, so tests move time instead of sleeping.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryCache").finish_non_exhaustive()
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Command(format!(
        "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
    ))
}

impl InMemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Remaining time to live of a key (tests/diagnostics).
    pub fn ttl(&self, key: &str) -> Option<chrono::Duration> {
        let now = self.clock.now();
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        match entry.expires_at {
            Some(at) if at > now => Some(at - now),
            Some(_) => None,
            None => Some(chrono::Duration::MAX),
        }
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>, DateTime<Utc>) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Connection("in-memory cache lock poisoned".to_string()))?;
        entries.retain(|_, e| e.expires_at.is_none_or(|at| at > now));
        f(&mut entries, now)
    }
}

impl CacheClient for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_entries(|entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(now + to_chrono(ttl)),
                },
            );
            Ok(())
        })
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.with_entries(|entries, now| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(now + to_chrono(ttl)),
                },
            );
            Ok(true)
        })
    }

    fn incr_ex(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        self.with_entries(|entries, now| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Str("0".to_string()),
                expires_at: None,
            });

            let next = match &entry.value {
                Value::Str(s) => s
                    .parse::<i64>()
                    .map_err(|_| CacheError::Command(format!("value at '{key}' is not an integer")))?
                    + 1,
                Value::Hash(_) => return Err(wrong_type(key)),
            };

            entry.value = Value::Str(next.to_string());
            entry.expires_at = Some(now + to_chrono(ttl));
            Ok(next)
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.with_entries(|entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + to_chrono(ttl));
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn hset_all(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(fields.iter().cloned().collect()),
                    expires_at: Some(now + to_chrono(ttl)),
                },
            );
            Ok(())
        })
    }

    fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        self.with_entries(|entries, _| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Hash(hash) => {
                    for (field, value) in fields {
                        hash.insert(field.clone(), value.clone());
                    }
                    Ok(())
                }
                Value::Str(_) => Err(wrong_type(key)),
            }
        })
    }

    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        self.with_entries(|entries, _| match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64, CacheError> {
        self.with_entries(|entries, _| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            let Value::Hash(hash) = &mut entry.value else {
                return Err(wrong_type(key));
            };

            let current = match hash.get(field) {
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    CacheError::Command(format!("hash field '{field}' at '{key}' is not an integer"))
                })?,
                None => 0,
            };
            let next = current + by;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.with_entries(|entries, _| Ok(entries.remove(key).is_some()))
    }

    fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.with_entries(|entries, _| {
            let mut keys: Vec<String> = entries
                .keys()
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect();
            keys.sort();
            Ok(keys)
        })
    }
}
