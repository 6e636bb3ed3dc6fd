//! Structured error types for the comic DNS server.

use std::fmt;
use std::io;

/// Errors raised while turning a query into a resolved comic.
///
/// Every variant is recovered at the query handler and mapped to a DNS
/// response code; none of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Query name does not match any recognised shape
    InvalidRequest(String),
    /// Upstream answered with a non-success HTTP status
    UpstreamUnavailable(u16),
    /// Transport-level failure (connect, TLS, timeout, too many redirects)
    FetchFailed(String),
    /// Page fetched but title or canonical id could not be derived
    ExtractionFailed(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ResolveError::UpstreamUnavailable(status) => {
                write!(f, "Upstream unavailable: HTTP status {}", status)
            }
            ResolveError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            ResolveError::ExtractionFailed(msg) => write!(f, "Extraction failed: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Startup and server-level errors
#[derive(Debug)]
pub enum ServerError {
    /// IO error (socket bind, send, config file)
    Io(io::Error),
    /// Configuration error
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Io(e) => write!(f, "IO error: {}", e),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Io(e) => Some(e),
            ServerError::Config(_) => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        ServerError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_request_display() {
        let err = ResolveError::InvalidRequest("abc.xkcd.".to_string());
        assert_eq!(err.to_string(), "Invalid request: abc.xkcd.");
    }

    #[test]
    fn test_upstream_unavailable_display() {
        let err = ResolveError::UpstreamUnavailable(404);
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Upstream unavailable"));
    }

    #[test]
    fn test_fetch_failed_display() {
        let err = ResolveError::FetchFailed("connection refused".to_string());
        assert_eq!(err.to_string(), "Fetch failed: connection refused");
    }

    #[test]
    fn test_extraction_failed_display() {
        let err = ResolveError::ExtractionFailed("no og:url".to_string());
        assert!(err.to_string().contains("no og:url"));
    }

    #[test]
    fn test_resolve_error_is_error() {
        let err: &dyn std::error::Error = &ResolveError::UpstreamUnavailable(500);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_server_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let err: ServerError = io_err.into();
        assert!(matches!(err, ServerError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_server_error_config_display() {
        let err = ServerError::Config("invalid listen address".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid listen address");
        assert!(err.source().is_none());
    }
}
