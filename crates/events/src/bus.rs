//! Notification contract (mechanics only).
//!
//! Delivery is best-effort: a notification is sent only after the transition
//! it describes has been written, so a lost message never loses state. Listeners
//! re-read the account when they care about its current shape.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use thiserror::Error;

use crate::AccountChange;

/// A subscription to account-change notifications.
///
/// Each subscription receives its own copy of every notification published
/// after it was created. Meant to be consumed by one thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notifier unavailable: {0}")]
    Unavailable(String),

    #[error("notification could not be encoded: {0}")]
    Encode(String),
}

/// Receives "account changed" notifications from the auth core.
pub trait AccountNotifier: Send + Sync {
    fn account_changed(&self, change: &AccountChange) -> Result<(), NotifyError>;
}

impl<N> AccountNotifier for Arc<N>
where
    N: AccountNotifier + ?Sized,
{
    fn account_changed(&self, change: &AccountChange) -> Result<(), NotifyError> {
        (**self).account_changed(change)
    }
}
