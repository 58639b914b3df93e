//! Typed error handling for the Socket.IO server core
//!
//! # Error Categories
//!
//! - [`RequestError`]: problems with an inbound HTTP request (bad URI, unknown
//!   transport or session, authorization)
//! - [`SessionError`]: session allocation failures
//! - [`DecodeError`]: undecodable frames and polling payloads
//! - [`ConfigError`]: configuration parsing and validation
//!
//! Every error maps to an HTTP status. Responses carry a plain-text body,
//! because that is what Socket.IO clients read; authorization and capacity
//! failures carry an empty body so nothing about the cause leaks.
//!
//! # Example
//!
//! ```rust,ignore
//! match server.lookup("polling", sid).await {
//!     Ok(session) => session.serve("polling", request).await,
//!     Err(SocketIoError::Request(RequestError::InvalidSessionId { .. })) => {
//!         // client must handshake again
//!     }
//!     Err(e) => e.into_response(),
//! }
//! ```

use crate::core::packet::DecodeError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// The main error type for the crate
#[derive(Debug)]
pub enum SocketIoError {
    /// HTTP request errors
    Request(RequestError),

    /// Session allocation errors
    Session(SessionError),

    /// Frame decoding errors
    Packet(DecodeError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for SocketIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketIoError::Request(e) => write!(f, "{}", e),
            SocketIoError::Session(e) => write!(f, "{}", e),
            SocketIoError::Packet(e) => write!(f, "{}", e),
            SocketIoError::Config(e) => write!(f, "{}", e),
            SocketIoError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for SocketIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketIoError::Request(e) => Some(e),
            SocketIoError::Session(e) => Some(e),
            SocketIoError::Packet(e) => Some(e),
            SocketIoError::Config(e) => Some(e),
            SocketIoError::Internal(_) => None,
        }
    }
}

impl SocketIoError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            SocketIoError::Request(e) => e.status_code(),
            SocketIoError::Session(e) => e.status_code(),
            SocketIoError::Packet(_) => StatusCode::BAD_REQUEST,
            SocketIoError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SocketIoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            SocketIoError::Request(e) => e.error_code(),
            SocketIoError::Session(e) => e.error_code(),
            SocketIoError::Packet(_) => "INVALID_PACKET",
            SocketIoError::Config(_) => "CONFIG_ERROR",
            SocketIoError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Body written to the client
    pub fn body(&self) -> String {
        match self {
            SocketIoError::Request(e) => e.body(),
            SocketIoError::Session(_) => String::new(),
            SocketIoError::Packet(e) => e.to_string(),
            SocketIoError::Config(_) | SocketIoError::Internal(_) => String::new(),
        }
    }
}

impl IntoResponse for SocketIoError {
    fn into_response(self) -> Response {
        tracing::debug!(
            code = self.error_code(),
            status = %self.status_code(),
            error = %self,
            "Rejecting request"
        );
        (self.status_code(), self.body()).into_response()
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to inbound HTTP requests
#[derive(Debug)]
pub enum RequestError {
    /// Path does not match `<resource>/1(/<transport>/<sid>)?/?`
    InvalidUri { uri: String },

    /// Transport segment names no registered transport
    TransportNotSupported { transport: String },

    /// No session is registered under this id
    InvalidSessionId { session_id: String },

    /// Authorization predicate rejected the handshake
    Unauthorized,

    /// Transport does not accept this HTTP method
    MethodNotAllowed { method: String },

    /// The session's outbound stream is already attached to a live connection
    TransportBusy { transport: String },

    /// The transport cannot be bound by a request of this shape
    UpgradeRequired { transport: String },

    /// Request body could not be read or decoded
    InvalidBody { message: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidUri { uri } => write!(f, "invalid uri: {}", uri),
            RequestError::TransportNotSupported { transport } => {
                write!(f, "transport not supported: {}", transport)
            }
            RequestError::InvalidSessionId { session_id } => {
                write!(f, "invalid session id: {}", session_id)
            }
            RequestError::Unauthorized => write!(f, "handshake unauthorized"),
            RequestError::MethodNotAllowed { method } => {
                write!(f, "method {} not allowed", method)
            }
            RequestError::TransportBusy { transport } => {
                write!(f, "transport {} already connected", transport)
            }
            RequestError::UpgradeRequired { transport } => {
                write!(f, "transport {} requires a connection upgrade", transport)
            }
            RequestError::InvalidBody { message } => {
                write!(f, "invalid request body: {}", message)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidUri { .. } => StatusCode::NOT_FOUND,
            RequestError::TransportNotSupported { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidSessionId { .. } => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized => StatusCode::UNAUTHORIZED,
            RequestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::TransportBusy { .. } => StatusCode::CONFLICT,
            RequestError::UpgradeRequired { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidUri { .. } => "INVALID_URI",
            RequestError::TransportNotSupported { .. } => "TRANSPORT_NOT_SUPPORTED",
            RequestError::InvalidSessionId { .. } => "INVALID_SESSION_ID",
            RequestError::Unauthorized => "UNAUTHORIZED",
            RequestError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            RequestError::TransportBusy { .. } => "TRANSPORT_BUSY",
            RequestError::UpgradeRequired { .. } => "UPGRADE_REQUIRED",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
        }
    }

    fn body(&self) -> String {
        match self {
            RequestError::InvalidUri { .. } => format!("{}\n", self),
            RequestError::TransportNotSupported { .. } => "transport not supported".to_string(),
            RequestError::InvalidSessionId { .. } => "invalid session id".to_string(),
            RequestError::Unauthorized => String::new(),
            _ => self.to_string(),
        }
    }
}

impl From<RequestError> for SocketIoError {
    fn from(err: RequestError) -> Self {
        SocketIoError::Request(err)
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors raised while allocating or registering a session
#[derive(Debug)]
pub enum SessionError {
    /// The session id generator produced nothing
    IdGenerationFailed,

    /// A session with this id is already registered
    DuplicateId { session_id: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::IdGenerationFailed => write!(f, "failed to generate a session id"),
            SessionError::DuplicateId { session_id } => {
                write!(f, "session id '{}' is already registered", session_id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::IdGenerationFailed => "SESSION_ID_GENERATION_FAILED",
            SessionError::DuplicateId { .. } => "DUPLICATE_SESSION_ID",
        }
    }
}

impl From<SessionError> for SocketIoError {
    fn from(err: SessionError) -> Self {
        SocketIoError::Session(err)
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration
    ParseError { message: String },

    /// Failed to read a configuration file
    Io { path: String, message: String },

    /// A transport name in the config is not registered
    UnknownTransport { name: String },

    /// A duration that must be positive is zero
    ZeroDuration { field: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { message } => {
                write!(f, "Failed to parse configuration: {}", message)
            }
            ConfigError::Io { path, message } => {
                write!(f, "Failed to read configuration '{}': {}", path, message)
            }
            ConfigError::UnknownTransport { name } => {
                write!(f, "Unknown transport '{}' in configuration", name)
            }
            ConfigError::ZeroDuration { field } => {
                write!(f, "Configuration field '{}' must be greater than zero", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SocketIoError {
    fn from(err: ConfigError) -> Self {
        SocketIoError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<DecodeError> for SocketIoError {
    fn from(err: DecodeError) -> Self {
        SocketIoError::Packet(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_map_to_statuses() {
        let cases = [
            (
                RequestError::InvalidUri { uri: "/x".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                RequestError::TransportNotSupported {
                    transport: "bogus".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RequestError::InvalidSessionId {
                    session_id: "nope".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (RequestError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];

        for (err, status) in cases {
            assert_eq!(SocketIoError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_session_errors_are_service_unavailable() {
        let err: SocketIoError = SessionError::IdGenerationFailed.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.body().is_empty());
    }

    #[test]
    fn test_bodies_use_protocol_wording() {
        let err: SocketIoError = RequestError::TransportNotSupported {
            transport: "bogus".into(),
        }
        .into();
        assert_eq!(err.body(), "transport not supported");

        let err: SocketIoError = RequestError::InvalidSessionId {
            session_id: "nope".into(),
        }
        .into();
        assert_eq!(err.body(), "invalid session id");

        let err: SocketIoError = RequestError::InvalidUri {
            uri: "/socket.io/nonsense".into(),
        }
        .into();
        assert_eq!(err.body(), "invalid uri: /socket.io/nonsense\n");
    }

    #[test]
    fn test_unauthorized_body_is_empty() {
        let err: SocketIoError = RequestError::Unauthorized.into();
        assert!(err.body().is_empty());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err: SocketIoError = ConfigError::UnknownTransport {
            name: "flashsocket".into(),
        }
        .into();
        assert!(err.source().is_some());
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = SocketIoError::Internal("boom".into());
        assert!(err.source().is_none());
    }
}
