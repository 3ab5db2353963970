use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::Error;

/// Default page the browser lands on when a login or token flow is aborted.
pub const ERROR_PAGE: &str = "/error";

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No id token in the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Login or token flow failed (discovery, state mismatch, exchange, provisioning).
    #[error(transparent)]
    Flow(#[from] Error),

    /// The provider redirected back with an error or without a code.
    #[error("Authorization callback rejected: {0}")]
    Callback(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// `POST /auth/token` could not mint a client.
    #[error("Client provisioning failed: {0}")]
    Provisioning(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Renders the error; aborted flows are redirected to `error_redirect`.
    pub fn into_response_with(self, error_redirect: &str) -> Response {
        match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "not authenticated" })),
            )
                .into_response(),
            Self::Flow(ref e) => {
                tracing::warn!(error = %e, code = e.code(), "Authentication flow aborted");
                error_page(error_redirect, e.code())
            }
            Self::Callback(ref code) => {
                tracing::warn!(code = %code, "Authorization callback rejected");
                error_page(error_redirect, code)
            }
            Self::BadRequest(ref msg) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
            Self::Provisioning(_) => {
                tracing::error!(error = %self, "Personal access token provisioning failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({ "error": "provisioning_failed" })),
                )
                    .into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_with(ERROR_PAGE)
    }
}

fn error_page(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    #[test]
    fn test_flow_errors_redirect_with_code() {
        let response = AuthError::from(Error::Csrf).into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/error?error=state_mismatch"
        );
    }

    #[test]
    fn test_callback_code_is_encoded() {
        let response = AuthError::Callback("access denied&x".into()).into_response();
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/error?error=access%20denied%26x"
        );
    }

    #[test]
    fn test_custom_error_redirect() {
        let response = AuthError::from(Error::Csrf).into_response_with("/login-failed");
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/login-failed?error=state_mismatch"
        );

        let response = AuthError::BadRequest("x".into()).into_response_with("/login-failed");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Provisioning("x".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::Config("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
