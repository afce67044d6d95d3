//! Redis-backed cache client (blocking).
//!
//! One connection per call, taken from the shared `redis::Client`. Compound
//! operations that must be atomic (`incr_ex`, `hset_all`) run as MULTI/EXEC
//! pipelines.
//!
//! Keys can embed session tokens, so nothing here logs a key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use redis::{Commands, Connection, RedisError};

use quayside_auth::{CacheClient, CacheError};

use super::ttl_secs;

#[derive(Debug, Clone)]
pub struct RedisCache {
    client: Arc<redis::Client>,
}

fn map_redis_error(err: RedisError) -> CacheError {
    if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Command(err.to_string())
    }
}

impl RedisCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn connection(&self) -> Result<Connection, CacheError> {
        self.client.get_connection().map_err(|e| {
            tracing::error!(error = %e, "redis connection failed");
            CacheError::Connection(e.to_string())
        })
    }

    /// Round-trip check used at startup.
    pub fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING").query(&mut conn).map_err(map_redis_error)?;
        Ok(())
    }
}

impl CacheClient for RedisCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection()?;
        conn.get(key).map_err(map_redis_error)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query::<()>(&mut conn)
            .map_err(map_redis_error)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    fn incr_ex(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        let mut conn = self.connection()?;
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .ignore()
            .query(&mut conn)
            .map_err(map_redis_error)?;
        Ok(count)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let updated: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(map_redis_error)?;
        Ok(updated == 1)
    }

    fn hset_all(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(key).ignore();
        if !fields.is_empty() {
            pipe.cmd("HSET").arg(key).arg(fields).ignore();
            pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)).ignore();
        }
        pipe.query::<()>(&mut conn).map_err(map_redis_error)
    }

    fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        redis::cmd("HSET")
            .arg(key)
            .arg(fields)
            .query::<()>(&mut conn)
            .map_err(map_redis_error)
    }

    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut conn = self.connection()?;
        conn.hgetall(key).map_err(map_redis_error)
    }

    fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64, CacheError> {
        let mut conn = self.connection()?;
        conn.hincr(key, field, by).map_err(map_redis_error)
    }

    fn del(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let removed: i64 = conn.del(key).map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection()?;
        let keys: Vec<String> = conn
            .scan_match::<_, String>(pattern)
            .map_err(map_redis_error)?
            .collect();
        Ok(keys)
    }
}
