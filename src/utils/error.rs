use thiserror::Error;

use super::response::ApiError;

/// Service-layer error taxonomy. Routes convert these into the JSON
/// envelope via the `From` impl below; the webhook path swallows them
/// after the signature gate instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("failed to initialize payment: {0}")]
    PaymentInit(String),

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// A settlement would drive `amount_remaining` negative. Never clamped;
    /// the record needs manual inspection.
    #[error("payment integrity violation: {0}")]
    Integrity(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::PaymentInit(msg) => {
                ApiError::bad_request(format!("Failed to initialize payment: {}", msg))
            }
            ServiceError::PaymentFailed(msg) => {
                ApiError::bad_request(format!("Payment failed: {}", msg))
            }
            ServiceError::Integrity(msg) => ApiError::internal_error(msg),
            ServiceError::Gateway(msg) => ApiError::bad_gateway(msg),
            ServiceError::Database(e) => ApiError::internal_error(e.to_string()),
        }
    }
}
