use axum::{Router, routing::get};

use crate::app::AppState;

pub mod auth;
pub mod system;

/// Router for endpoints that need an identified account.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/access/:module", get(auth::access))
}
