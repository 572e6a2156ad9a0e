//! Typed reply values.
//!
//! Produced by the translator from a successful [`RawReply`](super::RawReply).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CollectionKind;

// ============================================================================
// Reply
// ============================================================================

/// Typed outcome of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Server version.
    Version(VersionInfo),
    /// Database names.
    Databases(Vec<String>),
    /// Database properties.
    Database(DatabaseInfo),
    /// The server accepted the operation and returned nothing of interest.
    Ack,
    /// Collections of a database.
    Collections(Vec<CollectionInfo>),
    /// A single collection.
    Collection(CollectionInfo),
    /// A full document.
    Document(Value),
    /// Identity of a written or removed document.
    DocumentMeta(DocumentMeta),
    /// One batch of query results.
    Cursor(CursorBatch),
    /// Undecoded reply of a raw call.
    Raw {
        /// HTTP status code.
        status: u16,
        /// Parsed JSON body (`null` when empty).
        body: Value,
    },
}

// ============================================================================
// Payload Types
// ============================================================================

/// Server identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Server product name.
    pub server: String,
    /// Version string.
    pub version: String,
    /// License flavour, when reported.
    #[serde(default)]
    pub license: Option<String>,
}

/// Database properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Server-side identifier.
    pub id: String,
    /// Whether this is the system database.
    #[serde(rename = "isSystem", default)]
    pub is_system: bool,
}

/// Collection properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Server-side identifier.
    pub id: String,
    /// Collection type.
    pub kind: CollectionKind,
    /// Whether this is a system collection.
    pub is_system: bool,
}

/// Document identity returned by write operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// `collection/key` handle.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document key.
    #[serde(rename = "_key")]
    pub key: String,
    /// Revision after the operation.
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// One batch of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorBatch {
    /// Result rows.
    #[serde(default)]
    pub result: Vec<Value>,
    /// Whether more batches are available.
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    /// Cursor id for fetching the next batch.
    #[serde(default)]
    pub id: Option<String>,
    /// Total row count, if requested.
    #[serde(default)]
    pub count: Option<u64>,
}
