//! Error types for Shodan client operations

use thiserror::Error;

/// Result type alias for Shodan client operations
pub type Result<T> = std::result::Result<T, ShodanClientError>;

/// Message used when a failed response carries no readable body
pub const BODY_UNREADABLE: &str = "could not read error response";

/// Errors that can occur before a stream is handed to the caller, or from a
/// request/response call
#[derive(Error, Debug)]
pub enum ShodanClientError {
    /// Stream filter rejected before any I/O
    #[error("Invalid stream filter: {0}")]
    InvalidFilter(String),

    /// Request argument rejected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connection could not be established (DNS, TCP, TLS) or the request failed in flight
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Service error {status}: {message}")]
    Service { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Caller cancelled before the stream was established
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ShodanClientError {
    /// Create a service error from status code and message
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    /// The upstream message of a service error, if this is one
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service { message, .. } => Some(message),
            _ => None,
        }
    }
}
