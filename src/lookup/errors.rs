//! Lookup errors with HTTP-style status codes.

use crate::error::DbError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Unexpected Error: {0}")]
    Unexpected(String),

    #[error("No match found: {0}")]
    NoMatchFound(String),

    #[error("Invalid Email Address: {0}")]
    InvalidEmailAddress(String),

    #[error("Malformed Course Catalog Number: {0}")]
    InvalidCourseCatalogNumber(String),

    #[error("File upload error: {0}")]
    FileUpload(String),

    #[error("Too many matches: {0}")]
    TooManyMatches(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

pub type LookupResult<T> = Result<T, LookupError>;

impl LookupError {
    /// Status code for API responses.
    pub fn code(&self) -> u16 {
        match self {
            Self::NoMatchFound(_) => 404,
            Self::InvalidEmailAddress(_)
            | Self::InvalidCourseCatalogNumber(_)
            | Self::FileUpload(_) => 400,
            Self::Unexpected(_) | Self::TooManyMatches(_) | Self::Database(_) => 500,
        }
    }

    /// Fixed, client-safe summary of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unexpected(_) | Self::Database(_) => "Unexpected Error",
            Self::NoMatchFound(_) => "No match found",
            Self::InvalidEmailAddress(_) => "Invalid Email Address",
            Self::InvalidCourseCatalogNumber(_) => "Malformed Course Catalog Number",
            Self::FileUpload(_) => "File upload error",
            Self::TooManyMatches(_) => "Too many matches",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(LookupError::NoMatchFound("x".into()).code(), 404);
        assert_eq!(LookupError::InvalidEmailAddress("x".into()).code(), 400);
        assert_eq!(LookupError::InvalidCourseCatalogNumber("x".into()).code(), 400);
        assert_eq!(LookupError::FileUpload("x".into()).code(), 400);
        assert_eq!(LookupError::TooManyMatches("x".into()).code(), 500);
        assert_eq!(LookupError::Unexpected("x".into()).code(), 500);
    }

    #[test]
    fn test_database_errors_are_unexpected() {
        let err = LookupError::from(DbError::Execution("boom".into()));
        assert_eq!(err.code(), 500);
        assert_eq!(err.description(), "Unexpected Error");
        assert_eq!(err.to_string(), "Execution error: boom");
    }
}
