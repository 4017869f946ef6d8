//! Application-wide error types.

use thiserror::Error;

/// Application error types.
///
/// Every layer converts its own error enum into one of these classes at the
/// HTTP boundary. The `code` carried by most variants is the stable machine
/// readable code of the originating error (e.g. `INSUFFICIENT_FUNDS`).
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Stable error code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },

    /// Validation error.
    #[error("Validation error: {message}")]
    Validation {
        /// Stable error code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },

    /// Business rule violation.
    #[error("Business rule violation: {message}")]
    BusinessRule {
        /// Stable error code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },

    /// Conflict (e.g., duplicate entry or concurrent modification).
    #[error("Conflict: {message}")]
    Conflict {
        /// Stable error code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },

    /// The operation did not finish before its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a validation error.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error.
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::BusinessRule { .. } => 422,
            Self::Conflict { .. } => 409,
            Self::Timeout(_) => 504,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { code, .. }
            | Self::Validation { code, .. }
            | Self::BusinessRule { code, .. }
            | Self::Conflict { code, .. } => code,
            Self::Timeout(_) => "DEADLINE_EXCEEDED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the message safe to show to API clients.
    ///
    /// Database and internal details are logged, never returned.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound { message, .. }
            | Self::Validation { message, .. }
            | Self::BusinessRule { message, .. }
            | Self::Conflict { message, .. } => message.clone(),
            Self::Timeout(message) => message.clone(),
            Self::Database(_) | Self::Internal(_) => "An error occurred".to_string(),
        }
    }
}
