//! Redis pub/sub account-change notifier (optional).
//!
//! Note: Redis pub/sub is not durable (messages are dropped if no listener is
//! connected). Listeners live outside this workspace and only use these
//! messages to refresh live views, so a missed message costs a stale screen,
//! not a security decision.

use redis::Commands;

use quayside_events::{AccountChange, AccountNotifier, NotifyError};

/// Publishes JSON-encoded `AccountChange`s to one channel.
#[derive(Debug, Clone)]
pub struct RedisPubSubNotifier {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubNotifier {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, NotifyError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl AccountNotifier for RedisPubSubNotifier {
    fn account_changed(&self, change: &AccountChange) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(change).map_err(|e| NotifyError::Encode(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        tracing::debug!(
            account_id = %change.account_id,
            kind = change.kind.as_str(),
            receivers,
            "account change published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_does_not_connect() {
        let notifier = RedisPubSubNotifier::new("redis://127.0.0.1:1/", "quayside:accounts").unwrap();
        assert_eq!(notifier.channel(), "quayside:accounts");
    }

    #[test]
    fn malformed_url_is_unavailable() {
        let err = RedisPubSubNotifier::new("not a redis url", "quayside:accounts").unwrap_err();
        assert!(matches!(err, NotifyError::Unavailable(_)));
    }
}
