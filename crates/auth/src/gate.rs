//! Per-client-address throttle and blocklist.
//!
//! Consulted before any authentication logic runs. Failures feed a sliding
//! counter; reaching the threshold plants a block record whose lifetime is
//! independent of the counter's.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::{AuthError, CacheClient, CacheKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// Failures within one window that trigger a block.
    pub threshold: u32,
    /// Sliding window; every failure resets it.
    pub window: Duration,
    pub block: Duration,
    /// Fixed wait imposed on every unauthenticated response.
    pub delay: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            threshold: 100,
            window: Duration::from_secs(10),
            block: Duration::from_secs(15 * 60),
            delay: Duration::from_secs(1),
        }
    }
}

pub struct RequestGate {
    cache: Arc<dyn CacheClient>,
    keys: CacheKeys,
    policy: GatePolicy,
}

impl RequestGate {
    pub fn new(cache: Arc<dyn CacheClient>, keys: CacheKeys, policy: GatePolicy) -> Self {
        Self {
            cache,
            keys,
            policy,
        }
    }

    /// `false` while a block record exists. Seeing one extends it.
    pub fn allow(&self, client: IpAddr) -> Result<bool, AuthError> {
        let blocked = self
            .cache
            .expire(&self.keys.blocked(client), self.policy.block)?;
        if blocked {
            tracing::debug!(client = %client, "request from blocked client denied");
        }
        Ok(!blocked)
    }

    /// Count one failure for `client`; returns the count within the current window.
    pub fn record_failure(&self, client: IpAddr) -> Result<u64, AuthError> {
        let count = self
            .cache
            .incr_ex(&self.keys.rate_limit(client), self.policy.window)?;
        let count = u64::try_from(count).unwrap_or(0);

        if count >= u64::from(self.policy.threshold) {
            self.cache
                .set_ex(&self.keys.blocked(client), "1", self.policy.block)?;
            tracing::warn!(
                client = %client,
                attempts = count,
                block_secs = self.policy.block.as_secs(),
                "client blocked after repeated failures"
            );
        }

        Ok(count)
    }

    /// Blocks the calling thread for the configured response delay.
    pub fn delay(&self) {
        if !self.policy.delay.is_zero() {
            std::thread::sleep(self.policy.delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use quayside_core::ManualClock;

    use super::*;
    use crate::InMemoryCache;

    fn gate(policy: GatePolicy) -> (Arc<ManualClock>, RequestGate) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        (clock, RequestGate::new(cache, CacheKeys::default(), policy))
    }

    fn addr() -> IpAddr {
        "192.0.2.10".parse().unwrap()
    }

    fn small_policy() -> GatePolicy {
        GatePolicy {
            threshold: 3,
            window: Duration::from_secs(10),
            block: Duration::from_secs(60),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn blocks_once_threshold_is_reached() {
        let (_clock, gate) = gate(small_policy());
        assert!(gate.allow(addr()).unwrap());

        assert_eq!(gate.record_failure(addr()).unwrap(), 1);
        assert_eq!(gate.record_failure(addr()).unwrap(), 2);
        assert!(gate.allow(addr()).unwrap());
        assert_eq!(gate.record_failure(addr()).unwrap(), 3);
        assert!(!gate.allow(addr()).unwrap());
    }

    #[test]
    fn block_outlives_the_counter_window() {
        let (clock, gate) = gate(small_policy());
        for _ in 0..3 {
            gate.record_failure(addr()).unwrap();
        }

        // Counter window is long gone; block is still in force.
        clock.advance(chrono::Duration::seconds(30));
        assert!(!gate.allow(addr()).unwrap());
    }

    #[test]
    fn observing_a_block_extends_it() {
        let (clock, gate) = gate(small_policy());
        for _ in 0..3 {
            gate.record_failure(addr()).unwrap();
        }

        clock.advance(chrono::Duration::seconds(50));
        assert!(!gate.allow(addr()).unwrap());
        clock.advance(chrono::Duration::seconds(50));
        assert!(!gate.allow(addr()).unwrap());

        // Quiet for a full block duration: lifted.
        clock.advance(chrono::Duration::seconds(61));
        assert!(gate.allow(addr()).unwrap());
    }

    #[test]
    fn counter_expires_after_a_quiet_window() {
        let (clock, gate) = gate(small_policy());
        gate.record_failure(addr()).unwrap();
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(gate.record_failure(addr()).unwrap(), 1);
    }

    #[test]
    fn clients_are_counted_independently() {
        let (_clock, gate) = gate(small_policy());
        let other: IpAddr = "2001:db8::1".parse().unwrap();
        for _ in 0..3 {
            gate.record_failure(addr()).unwrap();
        }
        assert!(!gate.allow(addr()).unwrap());
        assert!(gate.allow(other).unwrap());
    }

    proptest! {
        // Failures spaced closer than the window never let the counter reset.
        #[test]
        fn sliding_window_keeps_counting(gaps in proptest::collection::vec(0i64..10, 1..40)) {
            let policy = GatePolicy { threshold: 1_000, ..small_policy() };
            let (clock, gate) = gate(policy);

            let mut expected = 0u64;
            for gap in gaps {
                clock.advance(chrono::Duration::seconds(gap));
                expected += 1;
                prop_assert_eq!(gate.record_failure(addr()).unwrap(), expected);
            }
        }
    }
}
