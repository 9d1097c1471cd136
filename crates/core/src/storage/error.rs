use thiserror::Error;

use crate::schema::SchemaError;

/// Errors that can occur when constructing a time window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeWindowError {
    #[error("Invalid time window: start must be before or equal to end")]
    Inverted,
}

/// Errors that can occur during repository operations.
///
/// The variants keep "not found", "bad data" and "store fault" apart so
/// callers never have to guess which one an empty-looking result means.
/// Rejected time windows are not errors; they surface as
/// [`WindowFilter::Empty`](super::WindowFilter) before a query is issued.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_error_display() {
        assert_eq!(
            TimeWindowError::Inverted.to_string(),
            "Invalid time window: start must be before or equal to end"
        );
    }

    #[test]
    fn test_repository_error_not_found_display() {
        let error = RepositoryError::NotFound {
            entity_type: "Transaction",
            id: "txn#abc-123".to_string(),
        };
        assert_eq!(error.to_string(), "Transaction not found: txn#abc-123");
    }

    #[test]
    fn test_repository_error_query_failed_display() {
        let error = RepositoryError::QueryFailed("invalid partition key".to_string());
        assert_eq!(error.to_string(), "Query failed: invalid partition key");
    }

    #[test]
    fn test_schema_error_passes_through() {
        let error = RepositoryError::from(SchemaError::UnknownTable("nope".to_string()));
        assert_eq!(error.to_string(), "unknown table: nope");
    }
}
