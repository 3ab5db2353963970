use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Domain API failure as seen by the console.
///
/// Every domain call is classified into exactly one of these; raw upstream
/// messages never reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("insufficient permission for this operation")]
    Forbidden,
    #[error("target resource does not exist")]
    NotFound,
    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// Classifies a non-success status code from the domain API.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            _ => Self::Internal,
        }
    }

    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        tracing::error!(error = %e, "Domain API request failed");
        Self::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(ApiError::from_status(StatusCode::FORBIDDEN), ApiError::Forbidden);
        assert_eq!(ApiError::from_status(StatusCode::NOT_FOUND), ApiError::NotFound);
        assert_eq!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Internal
        );
        assert_eq!(ApiError::from_status(StatusCode::BAD_GATEWAY), ApiError::Internal);
        assert_eq!(ApiError::from_status(StatusCode::UNAUTHORIZED), ApiError::Internal);
        assert_eq!(ApiError::from_status(StatusCode::CONFLICT), ApiError::Internal);
    }

    #[test]
    fn test_messages_are_fixed() {
        assert_eq!(
            ApiError::Forbidden.to_string(),
            "insufficient permission for this operation"
        );
        assert_eq!(ApiError::NotFound.to_string(), "target resource does not exist");
        assert_eq!(ApiError::Internal.to_string(), "internal error");
    }

    #[test]
    fn test_response_status() {
        assert_eq!(ApiError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
