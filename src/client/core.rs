//! Client handle.
//!
//! A [`Client`] is a cheap, cloneable handle to one worker task. Every clone
//! feeds the same queue, so all requests from all clones share one ordered
//! connection. The worker stops when [`Client::shutdown`] is called or when
//! the last clone is dropped.
//!
//! # Example
//!
//! ```no_run
//! use docdb_driver::Client;
//! use serde_json::json;
//!
//! # async fn example() -> docdb_driver::Result<()> {
//! let client = Client::builder()
//!     .endpoint("http://127.0.0.1:8529")
//!     .basic_auth("root", "")
//!     .build()?;
//!
//! client.create_database("shop").await?;
//! let shop = client.with_database("shop");
//! shop.create_collection("users", Default::default()).await?;
//! let meta = shop.create_document("users", &json!({ "name": "ada" })).await?;
//! let doc = shop.get_document("users", &meta.key).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::error::{Error, Result};
use crate::protocol::{
    CollectionInfo, CollectionKind, CursorBatch, DatabaseInfo, DocumentMeta, Operation, Reply,
    Request, VersionInfo,
};
use crate::transport::manager::{self, Inbox, Manager};
use crate::transport::{Connector, EventReceiver};

use super::builder::ClientBuilder;
use super::config::Config;

// ============================================================================
// PendingReply
// ============================================================================

/// Outcome of a submitted request, delivered later.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Reply>>,
}

impl PendingReply {
    /// Waits for the outcome.
    ///
    /// # Errors
    ///
    /// - Whatever the request itself failed with
    /// - [`Error::ConnectionClosed`] if the worker stopped without answering
    pub async fn recv(self) -> Result<Reply> {
        self.rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Returns the outcome if it has already arrived.
    pub fn try_recv(&mut self) -> Option<Result<Reply>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::ConnectionClosed)),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Shared state behind all clones.
struct ClientInner {
    inbox: mpsc::UnboundedSender<Inbox>,
    config: Config,
}

/// Handle to the driver.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    /// Database for typed calls; differs between [`Client::with_database`] views.
    database: Arc<str>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.config.endpoint)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Spawns the worker and returns the first handle.
    pub(crate) fn start<C: Connector>(
        runtime: &Handle,
        config: Config,
        connector: C,
        events: EventReceiver,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let manager = Manager::new(connector, &config);
        runtime.spawn(manager::run(manager, inbox_rx, events));

        info!(endpoint = %config.endpoint, database = %config.database, "Client started");

        Self {
            database: Arc::from(config.database.as_str()),
            inner: Arc::new(ClientInner {
                inbox: inbox_tx,
                config,
            }),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Database used by typed calls on this handle.
    #[inline]
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns a handle that issues typed calls against another database.
    ///
    /// Both handles share the same queue and connection.
    #[must_use]
    pub fn with_database(&self, name: impl AsRef<str>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            database: Arc::from(name.as_ref()),
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Queues a request without waiting.
    ///
    /// Requests are sent one at a time in submission order; outcomes are
    /// delivered in the same order.
    pub fn submit(&self, request: Request) -> PendingReply {
        let (reply_to, rx) = oneshot::channel();
        // If the worker is gone the sender is dropped with the message.
        let _ = self.inner.inbox.send(Inbox::Submit { request, reply_to });
        PendingReply { rx }
    }

    /// Queues an untyped message.
    ///
    /// The message must decode as an [`Operation`]; otherwise the reply is
    /// [`Error::UnrecognizedRequest`] and nothing is sent.
    pub fn submit_json(&self, message: Value) -> PendingReply {
        let (reply_to, rx) = oneshot::channel();
        let _ = self.inner.inbox.send(Inbox::Untyped { message, reply_to });
        PendingReply { rx }
    }

    /// Sends a request and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Any request-scoped [`Error`]; see [`PendingReply::recv`].
    pub async fn call(&self, request: Request) -> Result<Reply> {
        self.submit(request).recv().await
    }

    /// Validates an operation, sends it and waits for its outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the operation fails validation
    /// - Any error from [`Client::call`]
    pub async fn execute(&self, operation: Operation) -> Result<Reply> {
        operation.validate()?;
        self.call(operation.into_request()).await
    }

    /// Stops the worker: closes the connection and cancels pending requests.
    pub fn shutdown(&self) {
        let _ = self.inner.inbox.send(Inbox::Shutdown);
    }

    /// Returns `true` once the worker has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.inbox.is_closed()
    }
}

// ============================================================================
// Client - Server & Databases
// ============================================================================

impl Client {
    /// Returns the server version.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn version(&self) -> Result<VersionInfo> {
        match self.execute(Operation::Version).await? {
            Reply::Version(info) => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    /// Lists all database names.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        match self.execute(Operation::ListDatabases).await? {
            Reply::Databases(names) => Ok(names),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the properties of this handle's database.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn current_database(&self) -> Result<DatabaseInfo> {
        let operation = Operation::CurrentDatabase {
            database: self.database.to_string(),
        };
        match self.execute(operation).await? {
            Reply::Database(info) => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    /// Creates a database.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn create_database(&self, name: &str) -> Result<()> {
        self.ack(Operation::CreateDatabase { name: name.into() })
            .await
    }

    /// Drops a database.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn drop_database(&self, name: &str) -> Result<()> {
        self.ack(Operation::DropDatabase { name: name.into() })
            .await
    }
}

// ============================================================================
// Client - Collections
// ============================================================================

impl Client {
    /// Lists the collections of this handle's database.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let operation = Operation::ListCollections {
            database: self.database.to_string(),
        };
        match self.execute(operation).await? {
            Reply::Collections(list) => Ok(list),
            other => Err(unexpected(&other)),
        }
    }

    /// Creates a collection.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn create_collection(&self, name: &str, kind: CollectionKind) -> Result<CollectionInfo> {
        let operation = Operation::CreateCollection {
            database: self.database.to_string(),
            name: name.into(),
            kind,
        };
        self.collection(operation).await
    }

    /// Drops a collection.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.ack(Operation::DropCollection {
            database: self.database.to_string(),
            name: name.into(),
        })
        .await
    }

    /// Removes every document from a collection.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn truncate_collection(&self, name: &str) -> Result<CollectionInfo> {
        let operation = Operation::TruncateCollection {
            database: self.database.to_string(),
            name: name.into(),
        };
        self.collection(operation).await
    }
}

// ============================================================================
// Client - Documents
// ============================================================================

impl Client {
    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`]; a missing document satisfies
    /// [`Error::is_not_found`].
    pub async fn get_document(&self, collection: &str, key: &str) -> Result<Value> {
        let operation = Operation::GetDocument {
            database: self.database.to_string(),
            collection: collection.into(),
            key: key.into(),
        };
        match self.execute(operation).await? {
            Reply::Document(doc) => Ok(doc),
            other => Err(unexpected(&other)),
        }
    }

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `document` does not serialize
    /// - Any error from [`Client::execute`]
    pub async fn create_document<T: Serialize>(
        &self,
        collection: &str,
        document: &T,
    ) -> Result<DocumentMeta> {
        let operation = Operation::CreateDocument {
            database: self.database.to_string(),
            collection: collection.into(),
            document: serde_json::to_value(document)?,
        };
        self.document_meta(operation).await
    }

    /// Replaces a document, optionally only at revision `rev`.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `document` does not serialize
    /// - Any error from [`Client::execute`]
    pub async fn replace_document<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        document: &T,
        rev: Option<&str>,
    ) -> Result<DocumentMeta> {
        let operation = Operation::ReplaceDocument {
            database: self.database.to_string(),
            collection: collection.into(),
            key: key.into(),
            document: serde_json::to_value(document)?,
            rev: rev.map(str::to_string),
        };
        self.document_meta(operation).await
    }

    /// Merges `patch` into a document, optionally only at revision `rev`.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `patch` does not serialize
    /// - Any error from [`Client::execute`]
    pub async fn update_document<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        patch: &T,
        rev: Option<&str>,
    ) -> Result<DocumentMeta> {
        let operation = Operation::UpdateDocument {
            database: self.database.to_string(),
            collection: collection.into(),
            key: key.into(),
            patch: serde_json::to_value(patch)?,
            rev: rev.map(str::to_string),
        };
        self.document_meta(operation).await
    }

    /// Removes a document, optionally only at revision `rev`.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn delete_document(
        &self,
        collection: &str,
        key: &str,
        rev: Option<&str>,
    ) -> Result<DocumentMeta> {
        let operation = Operation::DeleteDocument {
            database: self.database.to_string(),
            collection: collection.into(),
            key: key.into(),
            rev: rev.map(str::to_string),
        };
        self.document_meta(operation).await
    }
}

// ============================================================================
// Client - Queries
// ============================================================================

impl Client {
    /// Runs a query and returns the first batch.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn query(
        &self,
        query: &str,
        bind_vars: Map<String, Value>,
        batch_size: Option<u32>,
    ) -> Result<CursorBatch> {
        let operation = Operation::Query {
            database: self.database.to_string(),
            query: query.into(),
            bind_vars,
            batch_size,
        };
        self.cursor(operation).await
    }

    /// Fetches the next batch of an open cursor.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::execute`].
    pub async fn next_batch(&self, cursor_id: &str) -> Result<CursorBatch> {
        let operation = Operation::NextBatch {
            database: self.database.to_string(),
            cursor_id: cursor_id.into(),
        };
        self.cursor(operation).await
    }

    /// Runs a query and follows the cursor until it is exhausted.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedReply`] if a batch says `hasMore` without a cursor id
    /// - Any error from [`Client::execute`]
    pub async fn query_all(&self, query: &str, bind_vars: Map<String, Value>) -> Result<Vec<Value>> {
        let mut batch = self.query(query, bind_vars, None).await?;
        let mut rows = std::mem::take(&mut batch.result);

        while batch.has_more {
            let cursor_id = batch
                .id
                .take()
                .ok_or_else(|| Error::malformed_reply(200, "cursor has more rows but no id"))?;
            batch = self.next_batch(&cursor_id).await?;
            rows.append(&mut batch.result);
        }

        Ok(rows)
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Client {
    async fn ack(&self, operation: Operation) -> Result<()> {
        match self.execute(operation).await? {
            Reply::Ack => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn collection(&self, operation: Operation) -> Result<CollectionInfo> {
        match self.execute(operation).await? {
            Reply::Collection(info) => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    async fn document_meta(&self, operation: Operation) -> Result<DocumentMeta> {
        match self.execute(operation).await? {
            Reply::DocumentMeta(meta) => Ok(meta),
            other => Err(unexpected(&other)),
        }
    }

    async fn cursor(&self, operation: Operation) -> Result<CursorBatch> {
        match self.execute(operation).await? {
            Reply::Cursor(batch) => Ok(batch),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(reply: &Reply) -> Error {
    Error::malformed_reply(0, format!("unexpected reply variant: {reply:?}"))
}

// ============================================================================
// Tests
// ============================================================================
