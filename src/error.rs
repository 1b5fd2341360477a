#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Error type shared by every Nack! operation
///
/// Domain operations, the document store and the external service clients all
/// report failures through this enum. The HTTP layer turns each variant into a
/// status code and a `{"error": "..."}` body.
#[derive(Error, Debug)]
pub enum NackError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Subscription expired")]
    SubscriptionExpired,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("Not enough loyalty points: {available} available, {requested} requested")]
    InsufficientPoints { available: i64, requested: i64 },

    #[error("Event is sold out: {remaining} seats remaining")]
    SoldOut { remaining: u32 },

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, NackError>;

impl NackError {
    /// Shorthand for a validation failure with a formatted message
    pub fn invalid(message: impl Into<String>) -> Self {
        NackError::Validation(message.into())
    }
}

#[cfg(feature = "web")]
impl From<reqwest::Error> for NackError {
    fn from(err: reqwest::Error) -> Self {
        NackError::Upstream(err.to_string())
    }
}

#[cfg(feature = "web")]
impl IntoResponse for NackError {
    fn into_response(self) -> Response {
        let status = match self {
            NackError::NotFound(_) => StatusCode::NOT_FOUND,
            NackError::Validation(_) => StatusCode::BAD_REQUEST,
            NackError::InvalidCredentials | NackError::Unauthenticated => StatusCode::UNAUTHORIZED,
            NackError::Forbidden => StatusCode::FORBIDDEN,
            NackError::SubscriptionExpired => StatusCode::PAYMENT_REQUIRED,
            NackError::Conflict(_)
            | NackError::InsufficientStock { .. }
            | NackError::InsufficientPoints { .. }
            | NackError::SoldOut { .. }
            | NackError::InvalidTransition { .. } => StatusCode::CONFLICT,
            NackError::Upstream(_) | NackError::Mail(_) => StatusCode::BAD_GATEWAY,
            NackError::Io(_) | NackError::Serialization(_) | NackError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            log::error!("{}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
