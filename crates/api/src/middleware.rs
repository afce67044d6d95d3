use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header::COOKIE},
    middleware::Next,
    response::Response,
};

use quayside_auth::{AuthError, Authenticator, CookieAction, SessionCookie};

use crate::app::errors::{auth_error_to_response, json_error, with_set_cookie};
use crate::app::{AppState, run_blocking};
use crate::context::{AccountContext, AuthMethod};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Routes whose every response counts as unauthenticated.
const CREDENTIAL_ROUTES: [&str; 2] = ["/auth/login", "/auth/activate"];

/// Per-client request gate.
///
/// Blocked clients get `429` before the handler runs. A `401`, or a `423` from
/// a credential route, counts as a failure for the client, and every
/// unauthenticated response is held for the gate's delay.
pub async fn gate_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let client = peer.ip();

    let gate = state.gate.clone();
    match tokio::task::spawn_blocking(move || gate.allow(client)).await {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => {
            return json_error(
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "too many failed requests; try again later",
            );
        }
        Ok(Err(e)) => return auth_error_to_response(e),
        Err(e) => {
            tracing::error!(error = %e, "gate check task failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
        }
    }

    let credential_route = CREDENTIAL_ROUTES.contains(&req.uri().path());
    let response = next.run(req).await;
    let failed = counts_as_failure(response.status(), credential_route);

    if failed || credential_route {
        let gate = state.gate.clone();
        let held = tokio::task::spawn_blocking(move || {
            if failed {
                if let Err(e) = gate.record_failure(client) {
                    tracing::warn!(error = %e, "failed to record gate failure");
                }
            }
            gate.delay();
        })
        .await;
        if let Err(e) = held {
            tracing::error!(error = %e, "gate bookkeeping task failed");
        }
    }

    response
}

/// Whether a response status counts against the client in the gate.
pub fn counts_as_failure(status: StatusCode, credential_route: bool) -> bool {
    status == StatusCode::UNAUTHORIZED || (credential_route && status == StatusCode::LOCKED)
}

/// Identify the caller from the session cookie, else from `X-Api-Key`.
///
/// A stale session cookie does not shadow a valid API key: the key is tried
/// and the cookie is cleared on the way out. On success an `AccountContext`
/// is inserted into the request extensions.
pub async fn identify_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = session_token(req.headers(), &state.cookie);
    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let auth = state.auth.clone();
    let identified =
        run_blocking(move || identify(&auth, token.as_deref(), api_key.as_deref())).await;

    match identified {
        Ok((ctx, action)) => {
            req.extensions_mut().insert(ctx);
            let response = next.run(req).await;
            with_set_cookie(response, state.cookie.render(&action))
        }
        Err(e) => e.into_response_with(&state.cookie),
    }
}

fn identify(
    auth: &Authenticator,
    token: Option<&str>,
    api_key: Option<&str>,
) -> Result<(AccountContext, CookieAction), AuthError> {
    let mut action = CookieAction::Keep;

    if token.is_some() {
        match auth.identify_from_session(token) {
            Ok(account) => return Ok((AccountContext::new(account, AuthMethod::Session), action)),
            Err(AuthError::SessionInvalid) if api_key.is_some() => {
                tracing::debug!("stale session cookie; falling back to api key");
                action = CookieAction::Clear;
            }
            Err(e) => return Err(e),
        }
    }

    match api_key {
        Some(key) => auth
            .identify_from_api_key(Some(key))
            .map(|account| (AccountContext::new(account, AuthMethod::ApiKey), action)),
        None => auth
            .identify_from_session(None)
            .map(|account| (AccountContext::new(account, AuthMethod::Session), action)),
    }
}

/// Session token from the request's `Cookie` header(s).
pub fn session_token(headers: &HeaderMap, cookie: &SessionCookie) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| cookie.token_from_header(header))
}
