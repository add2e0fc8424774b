//! Error types for visitlog.
//!
//! This module defines all error types used throughout the visitlog crate,
//! covering configuration, the remote list service, local storage, and form
//! validation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for visitlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// A required configuration value is missing.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what is missing.
        message: String,
    },

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Remote List Errors ===
    /// The token endpoint did not return an access token.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of what went wrong.
        message: String,
    },

    /// The remote list service returned a failure or an unusable body.
    #[error("remote list error: {detail}")]
    Remote {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Response body or transport error text.
        detail: String,
    },

    // === Record Errors ===
    /// No record matches the given identifier.
    #[error("visitor not found: {identifier}")]
    NotFound {
        /// The identifier that was looked up.
        identifier: String,
    },

    /// One or more form fields are missing or malformed.
    #[error("validation failed: {}", summarize(.errors))]
    Validation {
        /// Field name to message.
        errors: BTreeMap<String, String>,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The database was written by an incompatible schema.
    #[error("unsupported database schema: {message}")]
    DatabaseSchema {
        /// Description of what went wrong.
        message: String,
    },

    // === Signature Errors ===
    /// Failed to encode the signature raster.
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    /// An encoded image payload could not be decoded.
    #[error("invalid encoded image: {message}")]
    InvalidImage {
        /// Description of what is wrong with the payload.
        message: String,
    },

    // === Server Errors ===
    /// The HTTP API could not bind its listening socket.
    #[error("failed to start HTTP server on {address}: {message}")]
    ServerBind {
        /// The address that could not be bound.
        address: String,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for visitlog operations.
pub type Result<T> = std::result::Result<T, Error>;

fn summarize(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Remote {
            status: err.status().map(|s| s.as_u16()),
            detail,
        }
    }
}

impl Error {
    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a remote error without an HTTP status.
    #[must_use]
    pub fn remote(detail: impl Into<String>) -> Self {
        Self::Remote {
            status: None,
            detail: detail.into(),
        }
    }

    /// Create a remote error for a non-success HTTP response.
    #[must_use]
    pub fn remote_status(status: u16, detail: impl Into<String>) -> Self {
        Self::Remote {
            status: Some(status),
            detail: detail.into(),
        }
    }

    /// Create a not-found error for the given identifier.
    #[must_use]
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a new invalid image error.
    #[must_use]
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error came from the remote list service.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Check if this error indicates a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a missing or invalid configuration value.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::ConfigLoad(_) | Self::ConfigValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("8-888-888");
        assert_eq!(err.to_string(), "visitor not found: 8-888-888");

        let err = Error::configuration("AZURE_TENANT_ID is not set");
        assert_eq!(
            err.to_string(),
            "configuration error: AZURE_TENANT_ID is not set"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::remote("boom").is_remote());
        assert!(!Error::remote("boom").is_not_found());
        assert!(Error::not_found("x").is_not_found());
        assert!(Error::configuration("x").is_configuration());
        assert!(!Error::auth("x").is_configuration());
    }

    #[test]
    fn test_remote_status_error() {
        let err = Error::remote_status(403, "{\"error\":\"accessDenied\"}");
        match &err {
            Error::Remote { status, detail } => {
                assert_eq!(*status, Some(403));
                assert!(detail.contains("accessDenied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("accessDenied"));
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let mut errors = BTreeMap::new();
        errors.insert("cedula".to_string(), "Cédula requerida".to_string());
        errors.insert("correo".to_string(), "Correo inválido".to_string());
        let msg = Error::Validation { errors }.to_string();
        assert_eq!(
            msg,
            "validation failed: cedula: Cédula requerida; correo: Correo inválido"
        );
    }

    #[test]
    fn test_auth_error_display() {
        let err = Error::auth("no access_token in response");
        assert!(err.to_string().starts_with("authentication failed"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_open_error_display() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err = Error::DatabaseOpen {
                path: PathBuf::from("/nonexistent/path/db.sqlite"),
                source: sqlite_err,
            };
            assert!(err.to_string().contains("/nonexistent/path/db.sqlite"));
        }
    }

    #[test]
    fn test_invalid_image_error() {
        let err = Error::invalid_image("missing data URI prefix");
        assert_eq!(
            err.to_string(),
            "invalid encoded image: missing data URI prefix"
        );
    }
}
