//! Resolved client configuration.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::protocol::Credentials;
use crate::transport::Endpoint;

// ============================================================================
// Constants
// ============================================================================

/// Default server port.
pub const DEFAULT_PORT: u16 = 8529;

/// Default database for typed calls.
pub const DEFAULT_DATABASE: &str = "_system";

/// Default timeout for establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for one request once sent.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Config
// ============================================================================

/// Validated configuration, produced by
/// [`ClientBuilder`](super::ClientBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server address.
    pub endpoint: Endpoint,

    /// Credentials sent with every request that has none of its own.
    pub credentials: Option<Credentials>,

    /// Database used by typed calls.
    pub database: String,

    /// Limit for establishing the connection.
    pub connect_timeout: Duration,

    /// Limit for one request once sent. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("127.0.0.1", DEFAULT_PORT),
            credentials: None,
            database: DEFAULT_DATABASE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}
