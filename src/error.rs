//! Error types for the document-database driver.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use docdb_driver::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.create_database("inventory").await?;
//!     let names = client.list_databases().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Request | [`Error::UnrecognizedRequest`] |
//! | Remote | [`Error::RemoteRejected`] |
//! | Transport | [`Error::Transport`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`], [`Error::MalformedReply`] |
//! | Core | [`Error::ProtocolConfusion`], [`Error::Cancelled`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::protocol::Request;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Constants
// ============================================================================

/// Server error numbers that mean "the addressed thing does not exist".
const NOT_FOUND_CODES: &[i64] = &[1202, 1203, 1228];

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Request-scoped variants are delivered to the caller that issued the
/// request; nothing here is ever routed to an unrelated caller.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument for a request.
    ///
    /// Returned before submission, the request never reaches the queue.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The message is not a request this driver understands.
    ///
    /// Returned synchronously, the queue is untouched.
    #[error("Unrecognized request: {message}")]
    UnrecognizedRequest {
        /// Why the message could not be decoded.
        message: String,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The server answered with a failure-class status.
    #[error("Remote rejected request ({status}, code {code}): {message}")]
    RemoteRejected {
        /// HTTP status code.
        status: u16,
        /// Server error number (`errorNum`), 0 when absent.
        code: i64,
        /// Server error message.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The connection failed while this request was pending.
    #[error("Transport error on {} {}: {message}", request.method, request.path)]
    Transport {
        /// Raw failure reported by the transport.
        message: String,
        /// The request that was pending when the failure happened.
        request: Box<Request>,
    },

    /// Connection could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The driver worker has stopped.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No reply arrived within the request timeout.
    #[error("Request {sequence} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Submission sequence number of the request.
        sequence: u64,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// A success reply whose body does not have the expected shape.
    #[error("Malformed reply ({status}): {message}")]
    MalformedReply {
        /// HTTP status code.
        status: u16,
        /// What was wrong with the body.
        message: String,
    },

    // ========================================================================
    // Core Errors
    // ========================================================================
    /// Data arrived while no request was in flight.
    #[error("Protocol confusion: {message}")]
    ProtocolConfusion {
        /// Description of the unmatched data.
        message: String,
    },

    /// The request was still queued when the driver shut down.
    #[error("Request cancelled: driver shut down")]
    Cancelled,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unrecognized request error.
    #[inline]
    pub fn unrecognized_request(message: impl Into<String>) -> Self {
        Self::UnrecognizedRequest {
            message: message.into(),
        }
    }

    /// Creates a remote rejection error.
    #[inline]
    pub fn remote_rejected(status: u16, code: i64, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates a transport error for the given request.
    #[inline]
    pub fn transport(message: impl Into<String>, request: Request) -> Self {
        Self::Transport {
            message: message.into(),
            request: Box::new(request),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(sequence: u64, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            sequence,
            timeout_ms,
        }
    }

    /// Creates a malformed reply error.
    #[inline]
    pub fn malformed_reply(status: u16, message: impl Into<String>) -> Self {
        Self::MalformedReply {
            status,
            message: message.into(),
        }
    }

    /// Creates a protocol confusion error.
    #[inline]
    pub fn protocol_confusion(message: impl Into<String>) -> Self {
        Self::ProtocolConfusion {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the server rejected the request.
    #[inline]
    #[must_use]
    pub fn is_remote_rejection(&self) -> bool {
        matches!(self, Self::RemoteRejected { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if the failure happened below the HTTP layer.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::RequestTimeout { .. }
                | Self::MalformedReply { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` if the server reported that the target does not exist.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::RemoteRejected { status, code, .. } => {
                *status == 404 || NOT_FOUND_CODES.contains(code)
            }
            _ => false,
        }
    }

    /// Returns the request carried by a transport error.
    #[inline]
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Transport { request, .. } => Some(request),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use crate::protocol::Operation;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_remote_rejected_display() {
        let err = Error::remote_rejected(409, 1207, "duplicate name");
        assert_eq!(
            err.to_string(),
            "Remote rejected request (409, code 1207): duplicate name"
        );
        assert!(err.is_remote_rejection());
        assert!(!err.is_transport_error());
    }

    #[test]
    fn test_transport_error_carries_request() {
        let request = Operation::Version.into_request();
        let err = Error::transport("connection reset", request);

        assert!(err.is_transport_error());
        assert_eq!(err.request().map(|r| r.path.as_str()), Some("/_api/version"));
        assert_eq!(
            err.to_string(),
            "Transport error on GET /_api/version: connection reset"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(3, 5000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(timeout_err.is_transport_error());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::remote_rejected(404, 1202, "document not found").is_not_found());
        assert!(Error::remote_rejected(400, 1228, "database not found").is_not_found());
        assert!(!Error::remote_rejected(409, 1210, "conflict").is_not_found());
        assert!(!Error::Cancelled.is_not_found());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
