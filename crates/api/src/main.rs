use std::net::SocketAddr;

use anyhow::Context;

use quayside_api::app::{build_app, services};
use quayside_auth::AuthConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quayside_observability::init();

    let config = AuthConfig::from_env().context("invalid auth configuration")?;
    let state = services::build_state(&config).await?;
    let app = build_app(state);

    let bind = std::env::var("QUAYSIDE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
