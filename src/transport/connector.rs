//! Transport connector contract.
//!
//! A [`Connector`] never blocks: `connect`, `send` and `close` only start
//! work, and outcomes come back later as [`TransportEvent`]s on the channel
//! the connector was built with.
//!
//! Every event carries the generation of the connection it belongs to, so
//! late events from a connection the manager already abandoned can be
//! recognized and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::mpsc;

use crate::protocol::{Frame, RawReply};

// ============================================================================
// Types
// ============================================================================

/// Channel the connector reports events on.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving side of [`EventSender`].
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

// ============================================================================
// Endpoint
// ============================================================================

/// Remote host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Value for the HTTP `Host` header.
    #[inline]
    #[must_use]
    pub fn host_header(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened on a connection.
#[derive(Debug)]
pub struct TransportEvent {
    /// Connection generation the event belongs to.
    pub generation: u64,
    /// What happened.
    pub kind: EventKind,
}

impl TransportEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(generation: u64, kind: EventKind) -> Self {
        Self { generation, kind }
    }
}

/// Event payloads.
#[derive(Debug)]
pub enum EventKind {
    /// The connection is established.
    Connected,
    /// One complete reply arrived.
    Data(RawReply),
    /// The connect attempt failed.
    ConnectFailed(String),
    /// The current exchange failed below HTTP; the connection stays usable.
    Failure(String),
    /// The connection is gone.
    Closed(String),
}

// ============================================================================
// Connector
// ============================================================================

/// Capability to open one connection and exchange frames over it.
pub trait Connector: Send + 'static {
    /// Starts connecting; reports `Connected` or `ConnectFailed`.
    fn connect(&mut self, endpoint: &Endpoint, generation: u64);

    /// Queues one outbound request on the current connection.
    fn send(&mut self, frame: Frame);

    /// Tears down the current connection. Emits nothing.
    fn close(&mut self);
}

// ============================================================================
// Tests
// ============================================================================
