//! API-side authorization guard.
//!
//! Handlers call this before doing module-scoped work; the comparison itself
//! lives in the auth crate.

use axum::http::StatusCode;
use axum::response::Response;

use quayside_auth::{AuthzError, Module, PermissionLevel, require_level};

use crate::app::errors::json_error;
use crate::context::AccountContext;

/// Require `required` on `module` for the current request's account.
pub fn require_module(
    ctx: &AccountContext,
    module: Module,
    required: PermissionLevel,
) -> Result<(), Response> {
    require_level(ctx.account(), module, required).map_err(|e| {
        tracing::debug!(
            account_id = %ctx.account().id,
            module = module.as_str(),
            required = required.as_str(),
            "module access denied"
        );
        authz_error_to_response(e)
    })
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}
