use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request signature was missing or did not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The administrative master key was missing or did not match.
    #[error("Master key required")]
    MasterKeyMismatch,

    /// No user matched the supplied token or hardware identifier.
    #[error("User not found")]
    UserNotFound,

    /// The user exists but holds no currently valid entitlement.
    #[error("Subscription expired or inactive")]
    SubscriptionInactive,

    /// A per-source request ceiling was exhausted.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::InvalidSignature => {
                tracing::warn!("Invalid request signature");
                (StatusCode::FORBIDDEN, "Invalid signature".to_string())
            }

            AppError::MasterKeyMismatch => {
                tracing::warn!("Master key mismatch");
                (StatusCode::FORBIDDEN, "Master key required".to_string())
            }

            AppError::UserNotFound => {
                tracing::debug!("User not found");
                (StatusCode::NOT_FOUND, "User not found".to_string())
            }

            AppError::SubscriptionInactive => {
                tracing::debug!("Subscription expired or inactive");
                (StatusCode::FORBIDDEN, "Subscription expired or inactive".to_string())
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg.clone())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}
