//! `quayside-core`: primitives shared by every quayside crate.
//!
//! No infrastructure concerns live here: identifiers, the domain error model
//! and the clock abstraction used wherever "now" matters.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use id::AccountId;
