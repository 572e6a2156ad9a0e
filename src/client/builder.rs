//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use docdb_driver::Client;
//!
//! # async fn example() -> docdb_driver::Result<()> {
//! let client = Client::builder()
//!     .endpoint("http://db.local:8529")
//!     .basic_auth("root", "secret")
//!     .database("inventory")
//!     .request_timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Credentials, Operation};
use crate::transport::{Connector, Endpoint, EventSender, TcpConnector};

use super::config::{Config, DEFAULT_DATABASE, DEFAULT_PORT};
use super::core::Client;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Endpoint URL, overridden field by field by `host`/`port`.
    endpoint: Option<String>,
    /// Host name.
    host: Option<String>,
    /// Port.
    port: Option<u16>,
    /// Default credentials.
    credentials: Option<Credentials>,
    /// Default database.
    database: Option<String>,
    /// Connect timeout.
    connect_timeout: Option<Duration>,
    /// Request timeout; `Some(None)` disables it.
    request_timeout: Option<Option<Duration>>,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new client builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server URL, e.g. `http://db.local:8529`.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the server host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the server port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Uses HTTP Basic authentication by default.
    #[inline]
    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::basic(username, password));
        self
    }

    /// Uses a bearer token by default.
    #[inline]
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::bearer(token));
        self
    }

    /// Sets the database used by typed calls.
    #[inline]
    #[must_use]
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(Some(timeout));
        self
    }

    /// Waits for replies without limit.
    #[inline]
    #[must_use]
    pub fn no_request_timeout(mut self) -> Self {
        self.request_timeout = Some(None);
        self
    }

    /// Validates the configuration without starting anything.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the endpoint URL does not parse
    /// - [`Error::Config`] if the endpoint is not `http`, or a timeout is zero
    /// - [`Error::InvalidArgument`] if the database name is invalid
    pub fn config(self) -> Result<Config> {
        let defaults = Config::default();
        let endpoint = self.resolve_endpoint(&defaults.endpoint)?;

        let database = self
            .database
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        Operation::ListCollections {
            database: database.clone(),
        }
        .validate()?;

        let connect_timeout = self.connect_timeout.unwrap_or(defaults.connect_timeout);
        if connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be greater than zero"));
        }

        let request_timeout = self.request_timeout.unwrap_or(defaults.request_timeout);
        if request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "request timeout must be greater than zero. Use .no_request_timeout() to disable it.",
            ));
        }

        Ok(Config {
            endpoint,
            credentials: self.credentials,
            database,
            connect_timeout,
            request_timeout,
        })
    }

    /// Builds a client connected over TCP.
    ///
    /// The connection is opened lazily by the first request.
    ///
    /// # Errors
    ///
    /// - Any error from [`ClientBuilder::config`]
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<Client> {
        let config = self.config()?;
        let connect_timeout = config.connect_timeout;
        Self::spawn(config, |events| TcpConnector::new(events, connect_timeout))
    }

    /// Builds a client over a custom connector.
    ///
    /// # Errors
    ///
    /// Same as [`ClientBuilder::build`].
    pub fn build_with_connector<C, F>(self, make: F) -> Result<Client>
    where
        C: Connector,
        F: FnOnce(EventSender) -> C,
    {
        Self::spawn(self.config()?, make)
    }

    fn spawn<C, F>(config: Config, make: F) -> Result<Client>
    where
        C: Connector,
        F: FnOnce(EventSender) -> C,
    {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("Client must be built inside a tokio runtime"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connector = make(events_tx);

        Ok(Client::start(&runtime, config, connector, events_rx))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Combines URL, host and port into an endpoint.
    fn resolve_endpoint(&self, default: &Endpoint) -> Result<Endpoint> {
        let mut endpoint = default.clone();

        if let Some(raw) = &self.endpoint {
            let url = Url::parse(raw)?;
            if url.scheme() != "http" {
                return Err(Error::config(format!(
                    "Unsupported scheme {:?}. Only plain http endpoints are supported.\n\
                     Example: Client::builder().endpoint(\"http://127.0.0.1:8529\")",
                    url.scheme()
                )));
            }

            let host = url
                .host_str()
                .ok_or_else(|| Error::config(format!("Endpoint has no host: {raw}")))?;
            endpoint.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
            endpoint.port = url.port().unwrap_or(DEFAULT_PORT);
        }

        if let Some(host) = &self.host {
            if host.is_empty() {
                return Err(Error::config("Host must not be empty"));
            }
            endpoint.host.clone_from(host);
        }
        if let Some(port) = self.port {
            endpoint.port = port;
        }

        Ok(endpoint)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

    #[test]
    fn test_defaults() {
        let config = ClientBuilder::new().config().expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.endpoint, Endpoint::new("127.0.0.1", 8529));
        assert_eq!(config.database, "_system");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.request_timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_endpoint_url() {
        let config = ClientBuilder::new()
            .endpoint("http://db.local:9000")
            .config()
            .expect("config");
        assert_eq!(config.endpoint, Endpoint::new("db.local", 9000));
    }

    #[test]
    fn test_endpoint_without_port_uses_default() {
        let config = ClientBuilder::new()
            .endpoint("http://db.local")
            .config()
            .expect("config");
        assert_eq!(config.endpoint.port, 8529);
    }

    #[test]
    fn test_ipv6_endpoint() {
        let config = ClientBuilder::new()
            .endpoint("http://[::1]:8529")
            .config()
            .expect("config");
        assert_eq!(config.endpoint.host, "::1");
        assert_eq!(config.endpoint.host_header(), "[::1]:8529");
    }

    #[test]
    fn test_host_and_port_override_url() {
        let config = ClientBuilder::new()
            .endpoint("http://db.local:9000")
            .port(7000)
            .config()
            .expect("config");
        assert_eq!(config.endpoint, Endpoint::new("db.local", 7000));
    }

    #[test]
    fn test_https_rejected() {
        let err = ClientBuilder::new()
            .endpoint("https://db.local")
            .config()
            .unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_unparsable_url() {
        let err = ClientBuilder::new().endpoint("not a url").config().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_invalid_database_name() {
        let err = ClientBuilder::new()
            .database("has space")
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let err = ClientBuilder::new()
            .request_timeout(Duration::ZERO)
            .config()
            .unwrap_err();
        assert!(err.to_string().contains("no_request_timeout"));

        let config = ClientBuilder::new()
            .no_request_timeout()
            .config()
            .expect("config");
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_credentials() {
        let config = ClientBuilder::new()
            .basic_auth("root", "pw")
            .config()
            .expect("config");
        assert_eq!(config.credentials, Some(Credentials::basic("root", "pw")));

        let config = ClientBuilder::new()
            .bearer_token("jwt")
            .config()
            .expect("config");
        assert_eq!(config.credentials, Some(Credentials::bearer("jwt")));
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ClientBuilder::new().host("db.local");
        let cloned = builder.clone();
        assert_eq!(builder.host, cloned.host);
    }
}
