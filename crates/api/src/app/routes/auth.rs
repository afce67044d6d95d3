use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use quayside_auth::Module;

use crate::app::dto::{
    AccessQuery, AccountSummary, ActivateRequest, LoginRequest, ModuleAccess, parse_required_level,
};
use crate::app::errors::{json_error, with_set_cookie};
use crate::app::{AppState, run_blocking};
use crate::authz::require_module;
use crate::context::AccountContext;
use crate::middleware::session_token;

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let auth = state.auth.clone();
    let outcome = run_blocking(move || auth.login(&body.login, &body.secret)).await;

    match outcome {
        Ok(done) => {
            let summary = AccountSummary::from_account(&done.account, None);
            with_set_cookie(
                (StatusCode::OK, Json(summary)).into_response(),
                state.cookie.render(&done.cookie_action()),
            )
        }
        Err(e) => e.into_response_with(&state.cookie),
    }
}

pub async fn activate(
    State(state): State<AppState>,
    Json(body): Json<ActivateRequest>,
) -> Response {
    let auth = state.auth.clone();
    let outcome = run_blocking(move || auth.activate(&body.login, &body.new_secret)).await;

    match outcome {
        Ok(done) => {
            let summary = AccountSummary::from_account(&done.account, None);
            with_set_cookie(
                (StatusCode::OK, Json(summary)).into_response(),
                state.cookie.render(&done.cookie_action()),
            )
        }
        Err(e) => e.into_response_with(&state.cookie),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers, &state.cookie);
    let auth = state.auth.clone();

    match run_blocking(move || auth.logout(token.as_deref())).await {
        Ok(action) => with_set_cookie(
            StatusCode::NO_CONTENT.into_response(),
            state.cookie.render(&action),
        ),
        Err(e) => e.into_response_with(&state.cookie),
    }
}

pub async fn me(Extension(ctx): Extension<AccountContext>) -> Json<AccountSummary> {
    Json(AccountSummary::from_account(ctx.account(), Some(ctx.method())))
}

/// `GET /auth/access/:module?level=access|edit`: 200 with the module flags if
/// the account holds `level`, 403 otherwise.
pub async fn access(
    Extension(ctx): Extension<AccountContext>,
    Path(module): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<ModuleAccess>, Response> {
    let Some(module) = Module::parse(&module) else {
        return Err(json_error(StatusCode::NOT_FOUND, "unknown_module", "unknown module"));
    };
    let Some(required) = parse_required_level(query.level.as_deref()) else {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_level",
            "level must be one of: access, edit",
        ));
    };

    require_module(&ctx, module, required)?;
    Ok(Json(ModuleAccess::for_account(ctx.account(), module)))
}
