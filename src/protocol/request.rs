//! Request and raw reply message types.
//!
//! A [`Request`] is the opaque unit the connection manager queues and sends;
//! a [`RawReply`] is what the transport hands back before translation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Operation;

// ============================================================================
// Method
// ============================================================================

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method token as sent on the wire.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Credentials attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HTTP Basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token (JWT).
    Bearer(String),
}

impl Credentials {
    /// Creates basic credentials.
    #[inline]
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer credentials.
    #[inline]
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            Self::Bearer(token) => format!("bearer {token}"),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A request as queued by the connection manager.
///
/// Built from an [`Operation`] and immutable once submitted. Per-request
/// credentials and headers override the client defaults.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,

    /// Absolute path, already percent-encoded.
    pub path: String,

    /// Query parameters (not yet encoded).
    pub query: Vec<(String, String)>,

    /// JSON body.
    pub body: Option<Value>,

    /// Extra headers.
    pub headers: Vec<(String, String)>,

    /// Credentials overriding the client default.
    pub credentials: Option<Credentials>,

    /// Typed tag telling the translator what reply shape to expect.
    pub operation: Operation,
}

impl Request {
    /// Creates a request with no query, headers or credentials.
    #[inline]
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, operation: Operation) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            credentials: None,
            operation,
        }
    }

    /// Sets the JSON body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a query parameter.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Overrides the client credentials for this request only.
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Returns the path including the encoded query string.
    #[must_use]
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.path, query)
    }
}

// ============================================================================
// RawReply
// ============================================================================

/// An undecoded reply as read from the connection.
#[derive(Debug, Clone, Default)]
pub struct RawReply {
    /// HTTP status code.
    pub status: u16,

    /// Reason phrase from the status line.
    pub reason: String,

    /// Headers keyed by lowercase name.
    pub headers: FxHashMap<String, String>,

    /// Body bytes (de-chunked).
    pub body: Bytes,
}

impl RawReply {
    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Gets a header by case-insensitive name.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parses the body as JSON.
    ///
    /// An empty body parses as `null`.
    pub fn json(&self) -> serde_json::Result<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }
}

// ============================================================================
// Tests
// ============================================================================
