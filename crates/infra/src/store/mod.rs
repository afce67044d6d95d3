//! Durable store adapters.

pub mod postgres;

pub use postgres::{PostgresAccountStore, PostgresApiKeyStore};
