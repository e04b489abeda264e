//! Error types for memo.

use thiserror::Error;

/// Result type alias using memo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for memo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found, or owned by another user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation (duplicate email, category name, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or bad credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is a PostgreSQL unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("entry".to_string());
        assert_eq!(err.to_string(), "Not found: entry");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("limit must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid input: limit must be positive");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("email already registered".to_string());
        assert_eq!(err.to_string(), "Conflict: email already registered");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid token");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("DATABASE_URL missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: DATABASE_URL missing");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("password hashing failed".to_string());
        assert_eq!(err.to_string(), "Internal error: password hashing failed");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_row_not_found_is_not_unique_violation() {
        let err = Error::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(!Error::Conflict("x".into()).is_unique_violation());
    }
}
