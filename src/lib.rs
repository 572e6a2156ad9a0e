//! Document database driver over a single ordered HTTP connection.
//!
//! This library provides a typed API for a document database's REST
//! interface. All requests from all handles share one connection and are
//! sent one at a time, in submission order.
//!
//! # Architecture
//!
//! The driver is built around one worker task per [`Client`]:
//!
//! - **Client handles**: Build requests, queue them, await outcomes
//! - **Manager**: Owns the queue and the connection state machine
//! - **Connector**: Opens the connection, writes frames, reports replies
//!
//! Key design principles:
//!
//! - At most one request is on the wire at any time
//! - Replies are matched by order, so no correlation ids are needed
//! - The connection is opened lazily and reopened on demand
//! - Every requester gets exactly one outcome
//!
//! # Quick Start
//!
//! ```no_run
//! use docdb_driver::{Client, CollectionKind, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .endpoint("http://127.0.0.1:8529")
//!         .basic_auth("root", "")
//!         .database("shop")
//!         .build()?;
//!
//!     client.create_collection("users", CollectionKind::Document).await?;
//!     let meta = client.create_document("users", &json!({ "name": "ada" })).await?;
//!     let doc = client.get_document("users", &meta.key).await?;
//!     println!("{doc}");
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] handle and [`ClientBuilder`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Operations, requests, replies, HTTP framing |
//! | [`transport`] | Connection manager and connectors |

// ============================================================================
// Modules
// ============================================================================

/// Client handle and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Request and reply types.
///
/// Operation catalogue, typed replies and the HTTP/1.1 codec.
pub mod protocol;

/// Transport layer.
///
/// Connection manager, the connector contract and its implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, Config, PendingReply};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{
    CollectionInfo, CollectionKind, Credentials, CursorBatch, DatabaseInfo, DocumentMeta, Frame,
    Method, Operation, RawReply, Reply, Request, VersionInfo,
};

// Transport types
pub use transport::{
    Connector, Endpoint, EventKind, EventSender, MemoryConnector, MemoryHandle, TcpConnector,
    TransportEvent,
};
