//! HTTP API: login, activation, logout and identity endpoints over the
//! authentication core.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
