//! Error types for the proxy core.
//!
//! Every failure that can end a proxied exchange is a [`ProxyError`]. The
//! variants follow the lifecycle of a request: configuration problems stop
//! the instance from starting, template problems fail a single request
//! before any backend traffic, and backend failures surface after the
//! backend response has been released.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Unified error type for proxy operations.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or invalid target, invalid flags. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `{name}` placeholder had no matching query parameter.
    #[error("Missing HTTP parameter {name} to fill the template")]
    MissingTemplateParam {
        /// Placeholder name.
        name: String,
    },

    /// The per-request target URI could not be parsed.
    #[error("Rewritten target URI is invalid: {target} ({reason})")]
    InvalidTarget {
        /// The target after substitution.
        target: String,
        /// Parser message.
        reason: String,
    },

    /// Backend answered with a redirect status but no Location header.
    #[error("Backend returned redirect status {status} without a Location header")]
    MissingLocation {
        /// The 3xx status code.
        status: u16,
    },

    /// No backend connection became available in time.
    #[error("Timed out waiting for a backend connection after {waited_ms} ms")]
    PoolTimeout {
        /// How long the request waited.
        waited_ms: u64,
    },

    /// Could not connect to the backend.
    #[error("Backend connection failed: {0}")]
    BackendConnect(String),

    /// Backend did not answer in time.
    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    /// Any other transport or protocol failure talking to the backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A header name or value could not be represented on the wire.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the HTTP status code reported to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingTemplateParam { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidTarget { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingLocation { .. } => StatusCode::BAD_GATEWAY,
            Self::PoolTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::BackendConnect(_) => StatusCode::BAD_GATEWAY,
            Self::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidHeader(_) => StatusCode::BAD_GATEWAY,
            Self::Io(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns a sanitized message that does not expose internal details.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "Internal server error",
            Self::MissingTemplateParam { .. } | Self::InvalidTarget { .. } => {
                "Proxy target could not be resolved"
            }
            Self::MissingLocation { .. } => "Bad gateway",
            Self::PoolTimeout { .. } => "Service unavailable",
            Self::BackendConnect(_) => "Could not connect to backend",
            Self::BackendTimeout(_) => "Gateway timeout",
            Self::Backend(_) | Self::InvalidHeader(_) | Self::Io(_) => "Bad gateway",
        }
    }

    /// Returns true if the error originates on the proxy side of the
    /// exchange rather than in the backend.
    pub fn is_proxy_side(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::MissingTemplateParam { .. } | Self::InvalidTarget { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MissingTemplateParam { .. } => "missing_template_param",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::MissingLocation { .. } => "missing_location",
            Self::PoolTimeout { .. } => "pool_timeout",
            Self::BackendConnect(_) => "connect",
            Self::BackendTimeout(_) => "timeout",
            Self::Backend(_) => "backend",
            Self::InvalidHeader(_) => "invalid_header",
            Self::Io(_) => "io",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain")],
            self.user_message(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_display() {
        let err = ProxyError::MissingTemplateParam {
            name: "host".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing HTTP parameter host to fill the template"
        );

        let err = ProxyError::MissingLocation { status: 302 };
        assert!(err.to_string().contains("302"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::MissingTemplateParam { name: "x".into() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::BackendTimeout("read".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::PoolTimeout { waited_ms: 10 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ProxyError::BackendConnect("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = ProxyError::BackendConnect("10.0.0.7:8080 refused".into());
        assert!(!err.user_message().contains("10.0.0.7"));
        assert!(ProxyError::config("secret").user_message() == "Internal server error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: ProxyError = io_err.into();
        assert!(matches!(err, ProxyError::Io(_)));
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn test_into_response_is_plain_text() {
        let response = ProxyError::MissingTemplateParam { name: "port".into() }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "Proxy target could not be resolved");
    }
}
