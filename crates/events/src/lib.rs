//! Account-change notifications.
//!
//! The auth core announces activation and lockout transitions through the
//! [`AccountNotifier`] contract; how they are delivered (live-update fan-out,
//! pub/sub, nothing at all) is up to the implementation.

pub mod bus;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{AccountNotifier, NotifyError, Subscription};
pub use in_memory_bus::InMemoryNotifier;
pub use notification::{AccountChange, AccountChangeKind};
