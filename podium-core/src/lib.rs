pub mod identity;
pub mod slot;
pub mod repository;
pub mod mailer;
pub mod otp;
pub mod notify;

use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("Persistence failure: {0}")]
    PersistenceError(String),
    #[error("Downstream unavailable: {0}")]
    UnavailableError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Awaits `fut` for at most `limit`. Expiry surfaces as `UnavailableError`
/// naming the operation; the inner future is dropped.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {}ms", operation, limit.as_millis());
            Err(CoreError::UnavailableError(format!(
                "{} timed out after {}ms",
                operation,
                limit.as_millis()
            )))
        }
    }
}
