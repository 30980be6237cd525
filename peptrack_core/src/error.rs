//! Error types for the peptrack_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for peptrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Date range is inverted or wider than the allowed span
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Stored dosing fields do not describe a well-formed definition
    #[error("Invalid dosing definition: {0}")]
    InvalidDefinition(String),

    /// Protocol or patient does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A logged record carries values that cannot be stored
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Caller may not access the requested resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP-equivalent status for surfacing the error at an API boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRange(_) | Error::InvalidDefinition(_) | Error::InvalidRecord(_) => 400,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// True for errors caused by the request or stored data rather than the host
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
