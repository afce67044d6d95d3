//! Cache adapters.

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use std::time::Duration;

/// Expiry in whole seconds, as Redis expects it. Never zero: `EX 0` is rejected.
pub fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}
