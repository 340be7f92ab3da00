//! Error types for dbi.

use thiserror::Error;

/// The main error type for database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open a connection or pool.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed on the server.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested database flavor is not supported.
    #[error("unimplemented database type {0}")]
    UnsupportedFlavor(String),

    /// A value could not be converted.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A SQL template could not be rendered.
    #[error("Template error: {0}")]
    Template(String),

    /// Upsert without match columns and without a primary key.
    #[error("No match columns for upsert into '{0}': pass them explicitly or add a primary key")]
    NoMatchColumns(String),

    /// A column required by the operation is missing.
    #[error("Column '{column}' not found in {context}")]
    MissingColumn { column: String, context: String },

    /// CSV read or write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Create a missing column error.
    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    /// Whether the error was raised before anything reached the server.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnsupportedFlavor(_)
                | Self::Template(_)
                | Self::NoMatchColumns(_)
                | Self::MissingColumn { .. }
                | Self::Csv(_)
                | Self::Io(_)
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::missing_column("id", "frame");
        assert_eq!(err.to_string(), "Column 'id' not found in frame");

        let err = DbError::UnsupportedFlavor("oracle".into());
        assert_eq!(err.to_string(), "unimplemented database type oracle");
    }

    #[test]
    fn test_client_side() {
        assert!(DbError::NoMatchColumns("t".into()).is_client_side());
        assert!(!DbError::Execution("boom".into()).is_client_side());
    }
}
