//! Store-specific error types.

use appointly_core::{AppError, AuthError, NetworkError, ReqwestErrorExt};
use thiserror::Error;

/// A remote operation failed, with the reason.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please sign in to edit the calendar".to_string(),
            Self::PermissionDenied(_) => {
                "You don't have permission to change this calendar".to_string()
            }
            Self::NotFound(_) => "Appointment not found. Refresh the calendar.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::Api { status, .. } => format!("Calendar error ({})", status),
            Self::InvalidDocument(_) => "The calendar contains an unreadable entry".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408,
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthenticated => AppError::Auth(AuthError::Unauthenticated),
            StoreError::PermissionDenied(msg) => AppError::Auth(AuthError::PermissionDenied(msg)),
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::RateLimited(secs) => AppError::Network(NetworkError::RateLimited(secs)),
            StoreError::Api { status, message } if status >= 500 => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            StoreError::Api { status: 400, message } if message.contains("API key") => {
                AppError::Auth(AuthError::InvalidApiKey)
            }
            StoreError::Api { status, message } => {
                AppError::Service(format!("{}: {}", status, message))
            }
            StoreError::InvalidDocument(msg) => {
                AppError::Network(NetworkError::InvalidResponse(msg))
            }
            StoreError::Network(e) => AppError::Network(e.into_network_error()),
        }
    }
}
