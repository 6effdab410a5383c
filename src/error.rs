use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Errors that must reach the caller instead of being folded into a tool result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConnectionError(_))
    }

    /// The connection that produced this error cannot be trusted for another query.
    pub fn poisons_connection(&self) -> bool {
        matches!(self, AppError::DatabaseError(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::InvalidArgument(format!("dates must use YYYY-MM-DD ({})", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_database_errors_poison_the_connection() {
        assert!(AppError::from(sqlx::Error::Protocol("connection reset by peer".into())).poisons_connection());
        assert!(!AppError::QueryError("aggregate query returned no row".into()).poisons_connection());
        assert!(!AppError::SecurityError("multiple statements".into()).poisons_connection());
    }
}
