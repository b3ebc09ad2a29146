//! Unified error types for pagemeta.
//!
//! Every variant renders with a stable upper-case code prefix so log lines and
//! tool responses can be matched on without parsing free text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the pagemeta crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty domain).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A URL could not be parsed into a page request.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// No record exists for the given id.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Another record already owns the `(domain, path, query_hash)` identity.
    #[error("DUPLICATE_IDENTITY: {0}")]
    DuplicateIdentity(String),

    /// The cache store could not be read or written.
    #[error("CACHE_ERROR: {0}")]
    CacheUnavailable(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A value could not be encoded or decoded.
    #[error("SERIALIZATION: {0}")]
    Serialization(String),
}

impl Error {
    /// True when the underlying SQLite error is a UNIQUE/CHECK constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32602, msg.clone()),
            Error::NotFound(msg) => (-32001, msg.clone()),
            Error::DuplicateIdentity(msg) => (-32003, msg.clone()),
            Error::CacheUnavailable(msg) => (-32004, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Serialization(msg) => (-32000, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("page 42".to_string());
        assert!(err.to_string().starts_with("NOT_FOUND"));
        assert!(err.to_string().contains("page 42"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::DuplicateIdentity("example.com /".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32003);
    }

    #[test]
    fn test_invalid_url_is_invalid_params() {
        let mcp_err: McpError = Error::InvalidUrl("nope".to_string()).into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_constraint_violation_detection() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed".to_string()),
        );
        let err: Error = sqlite_err.into();
        assert!(err.is_constraint_violation());
        assert!(!Error::InvalidInput("x".into()).is_constraint_violation());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse_err.into();
        assert!(err.to_string().starts_with("SERIALIZATION"));
    }
}
