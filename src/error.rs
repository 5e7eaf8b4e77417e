use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// One message per offending field, reported together.
    #[error("{}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("{0}")]
    Conflict(String),

    /// Store, geocoder, mailer or file storage failure. `public` is what the
    /// caller sees; the cause is only logged.
    #[error("{public}")]
    Upstream {
        public: String,
        cause: anyhow::Error,
    },
}

impl ApiError {
    pub fn not_found(label: &str, id: &str) -> Self {
        ApiError::NotFound(format!("{} not found with id of {}", label, id))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::ValidationFailed(vec![message.into()])
    }

    pub fn upstream(public: impl Into<String>, cause: anyhow::Error) -> Self {
        ApiError::Upstream {
            public: public.into(),
            cause,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ValidationFailed(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(cause: anyhow::Error) -> Self {
        ApiError::upstream("Server Error", cause)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            success: false,
            error: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Upstream { public, cause } => {
                log::error!("{}: {:#}", public, cause);
            }
            other => {
                log::debug!("Request rejected ({}): {}", status, other);
            }
        }

        (status, Json(ErrorResponse::new(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_joined() {
        let error = ApiError::ValidationFailed(vec![
            "Please add a name".to_string(),
            "Please add a description".to_string(),
        ]);
        assert_eq!(error.to_string(), "Please add a name, Please add a description");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_hides_cause() {
        let error: ApiError = anyhow::anyhow!("connection refused on 10.0.0.3").into();
        assert_eq!(error.to_string(), "Server Error");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        let error = ApiError::not_found("Bootcamp", "abc");
        assert_eq!(error.to_string(), "Bootcamp not found with id of abc");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}
