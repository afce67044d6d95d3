use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use quayside_auth::{AuthError, ErrorClass, SessionCookie};

/// Failure of a handler: either the auth core said no, or the blocking task
/// running it did not complete.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Worker(String),
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        ApiError::Auth(value)
    }
}

impl ApiError {
    /// Render the error, applying the cookie action it implies.
    pub fn into_response_with(self, cookie: &SessionCookie) -> Response {
        match self {
            ApiError::Auth(err) => {
                let action = err.cookie_action();
                let response = auth_error_to_response(err);
                with_set_cookie(response, cookie.render(&action))
            }
            ApiError::Worker(msg) => {
                tracing::error!(error = %msg, "request worker failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
            }
        }
    }
}

/// HTTP status for an auth failure.
///
/// | failure                  | status |
/// |--------------------------|--------|
/// | account pending          | 409    |
/// | account status error     | 403    |
/// | secret rejected          | 422    |
/// | other client failures    | 401    |
/// | max attempts exceeded    | 423    |
/// | cache / store / hashing  | 503    |
pub fn auth_error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::AccountPending => StatusCode::CONFLICT,
        AuthError::AccountStatusError => StatusCode::FORBIDDEN,
        AuthError::SecretRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match err.class() {
            ErrorClass::Client => StatusCode::UNAUTHORIZED,
            ErrorClass::Security => StatusCode::LOCKED,
            ErrorClass::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}

pub fn auth_error_to_response(err: AuthError) -> Response {
    let status = auth_error_status(&err);
    if err.class() == ErrorClass::Infrastructure {
        tracing::error!(error = %err, "auth backend unavailable");
        // Backend details stay in the logs.
        return json_error(status, err.code(), "service temporarily unavailable");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Append a `Set-Cookie` header when there is one to send.
pub fn with_set_cookie(mut response: Response, set_cookie: Option<String>) -> Response {
    if let Some(value) = set_cookie {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "unencodable set-cookie value dropped"),
        }
    }
    response
}
