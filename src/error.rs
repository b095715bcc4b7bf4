// Error types for CertHound
//
// Structured error types using thiserror; every I/O boundary in the
// pipeline returns one of these so callers can match on the failure class.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for CertHound operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration or parameters; fatal at startup
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// WebSocket transport failure; triggers reconnect backoff
    #[error("Certstream transport error: {details}")]
    TransportError { details: String },

    /// A frame or payload could not be parsed; skipped, never fatal
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// A wildcard source could not be fetched; the source is skipped
    #[error("Wildcard source '{source_name}' fetch failed: {details}")]
    SourceFetchError {
        source_name: String,
        details: String,
    },

    /// DNS resolution failed with a classified kind
    #[error("DNS resolution failed for {hostname}: {kind:?}")]
    DnsError {
        hostname: String,
        kind: ResolveErrorKind,
    },

    /// Liveness probe failure; the discovery proceeds without URLs
    #[error("Probe failed for {url}: {details}")]
    ProbeError { url: String, details: String },

    /// Database operation errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Notification or fingerprinter delivery failure; logged and counted
    #[error("Notification error ({channel}): {details}")]
    NotificationError { channel: String, details: String },

    /// Timeout on an external call
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: io::Error,
    },

    /// Reqwest HTTP client errors
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Classified DNS failure kinds
///
/// Timeout and ServFail are retry-worthy; NxDomain is permanent and is
/// neither retried nor enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    NxDomain,
    Timeout,
    ServFail,
    Other,
}

impl ResolveErrorKind {
    /// Whether a failure of this kind should land in the retry queue
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveErrorKind::Timeout | ResolveErrorKind::ServFail)
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DatabaseError(err.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for PipelineError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        PipelineError::Timeout {
            duration: Duration::from_secs(0),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Other(format!("Task join error: {}", err))
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ResolveErrorKind::Timeout.is_transient());
        assert!(ResolveErrorKind::ServFail.is_transient());
        assert!(!ResolveErrorKind::NxDomain.is_transient());
        assert!(!ResolveErrorKind::Other.is_transient());
    }

    #[test]
    fn test_dns_error_display() {
        let err = PipelineError::DnsError {
            hostname: "api.example.com".to_string(),
            kind: ResolveErrorKind::Timeout,
        };

        let msg = err.to_string();
        assert!(msg.contains("api.example.com"));
        assert!(msg.contains("Timeout"));
    }

    #[test]
    fn test_source_fetch_error_display() {
        let err = PipelineError::SourceFetchError {
            source_name: "hackerone".to_string(),
            details: "status 503".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("hackerone"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: PipelineError = io_err.into();

        assert!(matches!(err, PipelineError::IoError { .. }));
    }
}
