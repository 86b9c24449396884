use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podium_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    InvalidOtp,
    NotFoundError(String),
    ConflictError(String),
    ServiceUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidOtp => (StatusCode::BAD_REQUEST, "Invalid OTP".to_string()),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Service Unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::ConflictError(msg) => AppError::ConflictError(msg),
            CoreError::NotFoundError(msg) => AppError::NotFoundError(msg),
            CoreError::AuthError(msg) => AppError::AuthenticationError(msg),
            CoreError::InvalidOtp => AppError::InvalidOtp,
            CoreError::UnavailableError(msg) => AppError::ServiceUnavailable(msg),
            CoreError::PersistenceError(msg) | CoreError::InternalError(msg) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// Path ids are 26-char ULIDs.
pub fn parse_id(raw: &str) -> Result<ulid::Ulid, AppError> {
    ulid::Ulid::from_string(raw)
        .map_err(|_| AppError::ValidationError(format!("'{}' is not a valid id", raw)))
}
