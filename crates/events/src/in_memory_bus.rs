//! In-memory notifier for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::bus::{AccountNotifier, NotifyError, Subscription};
use crate::AccountChange;

/// In-process fan-out of account changes.
///
/// - No IO
/// - Dead subscribers are dropped on the next publish
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    subscribers: Mutex<Vec<mpsc::Sender<AccountChange>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<AccountChange> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just stays silent.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

impl AccountNotifier for InMemoryNotifier {
    fn account_changed(&self, change: &AccountChange) -> Result<(), NotifyError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| NotifyError::Unavailable("subscriber list poisoned".to_string()))?;

        subs.retain(|tx| tx.send(change.clone()).is_ok());
        tracing::debug!(
            account_id = %change.account_id,
            kind = %change.kind,
            subscribers = subs.len(),
            "account change fanned out"
        );

        Ok(())
    }
}
