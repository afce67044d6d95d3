//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborator wiring and the shared `AppState`
//! - `routes/`: HTTP handlers
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use quayside_auth::AuthError;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use errors::ApiError;
pub use services::AppState;

/// Build the full HTTP router.
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`:
/// the request gate keys on the peer address.
pub fn build_app(state: AppState) -> Router {
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::identify_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/activate", post(routes::auth::activate))
        .route("/auth/logout", post(routes::auth::logout))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::gate_middleware,
        )))
        .with_state(state)
}

/// Run a blocking auth-core call off the async executor.
pub async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Worker(e.to_string())),
    }
}
