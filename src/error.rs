use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// The selection does not match the event's kind or belongs to another event.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Selected seat is not available")]
    SlotUnavailable,

    #[error("Not enough seats available in this zone. Only {available} left.")]
    InsufficientCapacity { available: i64 },

    #[error("Payment signature verification failed")]
    SignatureInvalid,

    #[error("Unknown gateway order: {0}")]
    UnknownOrder(String),

    #[error("This booking is already cancelled")]
    AlreadyCancelled,

    #[error("Cannot cancel booking for an event that has already started")]
    EventAlreadyStarted,

    #[error("This event has already ended")]
    EventClosed,

    /// Retryable: the gateway could not be reached or rejected the order.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Integration error: {0}")]
    Integration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Gateway and storage hiccups may succeed when the caller tries again;
    /// everything else is a decision about the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway(_) | AppError::Database(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_message) = match self {
            AppError::InvalidSlot(_) => (StatusCode::BAD_REQUEST, message),
            AppError::SlotUnavailable | AppError::InsufficientCapacity { .. } => {
                (StatusCode::CONFLICT, message)
            }
            AppError::SignatureInvalid => {
                tracing::warn!("Rejected gateway callback: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::UnknownOrder(ref order_id) => {
                tracing::warn!("Gateway callback for unknown order {}", order_id);
                (StatusCode::NOT_FOUND, message)
            }
            AppError::AlreadyCancelled | AppError::EventAlreadyStarted | AppError::EventClosed => {
                (StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            AppError::Gateway(ref msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment gateway unavailable, please retry".to_string())
            }
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::Integration(ref msg) => {
                tracing::error!("Integration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Integration error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
