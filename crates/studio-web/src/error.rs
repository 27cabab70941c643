//! HTTP error responses.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use studio_core::StudioError;

/// Error body returned by every handler: `{ "success": false, "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        match err {
            e if e.is_client_error() => Self::bad_request(e.to_string()),
            StudioError::Provider(e) => Self::internal(e.friendly_message()),
            e @ StudioError::MissingCredentials(_) => Self::internal(e.to_string()),
            e => {
                tracing::error!(error = %e, "Unhandled studio error");
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: format!("Invalid form data: {}", err.body_text()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self {
            status: err.status(),
            message: format!("Invalid JSON body: {}", err.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "Request rejected");
        }
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::providers::ProviderError;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = StudioError::validation("Front drawing is required").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = StudioError::FileTooLarge {
            name: "big.png".to_string(),
            limit_mb: 10,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "File \"big.png\" is too large. Maximum size is 10MB.");

        let err: ApiError = StudioError::MissingCredentials("OPENAI_API_KEY").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "OPENAI_API_KEY not configured");

        let err: ApiError = StudioError::from(ProviderError::Api {
            provider: "OpenAI",
            status: 429,
            body: "Rate limit reached for requests".to_string(),
        })
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "OpenAI API rate limit exceeded. Please try again later.");

        let err: ApiError = StudioError::Config("/srv/studio/studio.toml: bad key".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
