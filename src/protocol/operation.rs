//! Typed operation catalogue.
//!
//! Each [`Operation`] renders one REST call (method, path template, body)
//! and tells the translator which reply shape to expect.
//!
//! # Operations
//!
//! | Group | Operations |
//! |-------|------------|
//! | Server | `version` |
//! | Database | `list_databases`, `current_database`, `create_database`, `drop_database` |
//! | Collection | `list_collections`, `create_collection`, `drop_collection`, `truncate_collection` |
//! | Document | `get_document`, `create_document`, `replace_document`, `update_document`, `delete_document` |
//! | Query | `query`, `next_batch` |
//! | Passthrough | `raw` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

use super::{Method, Request};

// ============================================================================
// Constants
// ============================================================================

/// Database and collection names: letter or `_` first (system names), then
/// letters, digits, `_`, `-`.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]{0,63}$").expect("name pattern is a valid regex")
});

/// Document keys: the server's allowed key alphabet.
static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-:.@()+,=;$!*'%]{1,254}$").expect("key pattern is a valid regex")
});

// ============================================================================
// CollectionKind
// ============================================================================

/// Collection type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Document collection.
    #[default]
    Document,
    /// Edge collection.
    Edge,
}

impl CollectionKind {
    /// Numeric type code used by the REST API.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Document => 2,
            Self::Edge => 3,
        }
    }

    /// Maps a REST type code back to a kind.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            2 => Some(Self::Document),
            3 => Some(Self::Edge),
            _ => None,
        }
    }
}

// ============================================================================
// Operation
// ============================================================================

/// All operations the driver can issue.
///
/// Serialized with an `op` tag so untyped JSON messages can be decoded:
///
/// ```json
/// { "op": "create_database", "name": "inventory" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Server version.
    Version,

    /// Names of all databases.
    ListDatabases,

    /// Properties of a database.
    CurrentDatabase {
        /// Database name.
        database: String,
    },

    /// Create a database.
    CreateDatabase {
        /// Database name.
        name: String,
    },

    /// Drop a database.
    DropDatabase {
        /// Database name.
        name: String,
    },

    /// Collections of a database.
    ListCollections {
        /// Database name.
        database: String,
    },

    /// Create a collection.
    CreateCollection {
        /// Database name.
        database: String,
        /// Collection name.
        name: String,
        /// Collection type.
        #[serde(default)]
        kind: CollectionKind,
    },

    /// Drop a collection.
    DropCollection {
        /// Database name.
        database: String,
        /// Collection name.
        name: String,
    },

    /// Remove all documents from a collection.
    TruncateCollection {
        /// Database name.
        database: String,
        /// Collection name.
        name: String,
    },

    /// Read a document.
    GetDocument {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
    },

    /// Insert a document.
    CreateDocument {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
        /// Document body.
        document: Value,
    },

    /// Replace a document.
    ReplaceDocument {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// New document body.
        document: Value,
        /// Expected revision.
        #[serde(default)]
        rev: Option<String>,
    },

    /// Partially update a document.
    UpdateDocument {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// Attributes to merge.
        patch: Value,
        /// Expected revision.
        #[serde(default)]
        rev: Option<String>,
    },

    /// Remove a document.
    DeleteDocument {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// Expected revision.
        #[serde(default)]
        rev: Option<String>,
    },

    /// Run a query and fetch the first batch.
    Query {
        /// Database name.
        database: String,
        /// Query text.
        query: String,
        /// Bind parameters.
        #[serde(default)]
        bind_vars: Map<String, Value>,
        /// Batch size hint.
        #[serde(default)]
        batch_size: Option<u32>,
    },

    /// Fetch the next batch of an open cursor.
    NextBatch {
        /// Database name.
        database: String,
        /// Cursor id from the previous batch.
        cursor_id: String,
    },

    /// Arbitrary call, reply returned undecoded.
    Raw {
        /// HTTP method.
        method: Method,
        /// Absolute path.
        path: String,
        /// JSON body.
        #[serde(default)]
        body: Option<Value>,
    },
}

// ============================================================================
// Operation - Request Building
// ============================================================================

impl Operation {
    /// Returns the operation tag, as used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::ListDatabases => "list_databases",
            Self::CurrentDatabase { .. } => "current_database",
            Self::CreateDatabase { .. } => "create_database",
            Self::DropDatabase { .. } => "drop_database",
            Self::ListCollections { .. } => "list_collections",
            Self::CreateCollection { .. } => "create_collection",
            Self::DropCollection { .. } => "drop_collection",
            Self::TruncateCollection { .. } => "truncate_collection",
            Self::GetDocument { .. } => "get_document",
            Self::CreateDocument { .. } => "create_document",
            Self::ReplaceDocument { .. } => "replace_document",
            Self::UpdateDocument { .. } => "update_document",
            Self::DeleteDocument { .. } => "delete_document",
            Self::Query { .. } => "query",
            Self::NextBatch { .. } => "next_batch",
            Self::Raw { .. } => "raw",
        }
    }

    /// Checks names and keys before the operation is submitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid name or key.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Version | Self::ListDatabases => Ok(()),
            Self::CurrentDatabase { database } | Self::ListCollections { database } => {
                validate_name("database", database)
            }
            Self::CreateDatabase { name } | Self::DropDatabase { name } => {
                validate_name("database", name)
            }
            Self::CreateCollection { database, name, .. }
            | Self::DropCollection { database, name }
            | Self::TruncateCollection { database, name } => {
                validate_name("database", database)?;
                validate_name("collection", name)
            }
            Self::GetDocument {
                database,
                collection,
                key,
            } => {
                validate_name("database", database)?;
                validate_name("collection", collection)?;
                validate_key(key)
            }
            Self::ReplaceDocument {
                database,
                collection,
                key,
                rev,
                ..
            }
            | Self::UpdateDocument {
                database,
                collection,
                key,
                rev,
                ..
            }
            | Self::DeleteDocument {
                database,
                collection,
                key,
                rev,
            } => {
                validate_name("database", database)?;
                validate_name("collection", collection)?;
                validate_key(key)?;
                rev.as_deref().map_or(Ok(()), validate_rev)
            }
            Self::CreateDocument {
                database,
                collection,
                document,
            } => {
                validate_name("database", database)?;
                validate_name("collection", collection)?;
                if document.is_object() {
                    Ok(())
                } else {
                    Err(Error::invalid_argument("document must be a JSON object"))
                }
            }
            Self::Query {
                database, query, ..
            } => {
                validate_name("database", database)?;
                if query.trim().is_empty() {
                    return Err(Error::invalid_argument("query must not be empty"));
                }
                Ok(())
            }
            Self::NextBatch {
                database,
                cursor_id,
            } => {
                validate_name("database", database)?;
                if cursor_id.is_empty() {
                    return Err(Error::invalid_argument("cursor id must not be empty"));
                }
                Ok(())
            }
            Self::Raw { path, .. } => {
                if !path.starts_with('/') {
                    return Err(Error::invalid_argument(format!(
                        "path must be absolute: {path:?}"
                    )));
                }
                if !path.chars().all(|c| c.is_ascii_graphic()) {
                    return Err(Error::invalid_argument(format!(
                        "path must be printable ASCII without spaces: {path:?}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Renders the operation into a request.
    #[must_use]
    pub fn into_request(self) -> Request {
        let (method, path, body) = self.render();
        let rev = match &self {
            Self::ReplaceDocument { rev, .. }
            | Self::UpdateDocument { rev, .. }
            | Self::DeleteDocument { rev, .. } => rev.clone(),
            _ => None,
        };

        let mut request = Request::new(method, path, self);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(rev) = rev {
            request = request.with_header("If-Match", rev);
        }
        request
    }

    /// Method, path and body for this operation.
    fn render(&self) -> (Method, String, Option<Value>) {
        match self {
            Self::Version => (Method::Get, "/_api/version".into(), None),
            Self::ListDatabases => (Method::Get, "/_api/database".into(), None),
            Self::CurrentDatabase { database } => (
                Method::Get,
                format!("{}/_api/database/current", db_prefix(database)),
                None,
            ),
            Self::CreateDatabase { name } => (
                Method::Post,
                "/_api/database".into(),
                Some(json!({ "name": name })),
            ),
            Self::DropDatabase { name } => (
                Method::Delete,
                format!("/_api/database/{}", segment(name)),
                None,
            ),
            Self::ListCollections { database } => (
                Method::Get,
                format!("{}/_api/collection", db_prefix(database)),
                None,
            ),
            Self::CreateCollection {
                database,
                name,
                kind,
            } => (
                Method::Post,
                format!("{}/_api/collection", db_prefix(database)),
                Some(json!({ "name": name, "type": kind.code() })),
            ),
            Self::DropCollection { database, name } => (
                Method::Delete,
                format!("{}/_api/collection/{}", db_prefix(database), segment(name)),
                None,
            ),
            Self::TruncateCollection { database, name } => (
                Method::Put,
                format!(
                    "{}/_api/collection/{}/truncate",
                    db_prefix(database),
                    segment(name)
                ),
                None,
            ),
            Self::GetDocument {
                database,
                collection,
                key,
            } => (Method::Get, document_path(database, collection, key), None),
            Self::CreateDocument {
                database,
                collection,
                document,
            } => (
                Method::Post,
                format!(
                    "{}/_api/document/{}",
                    db_prefix(database),
                    segment(collection)
                ),
                Some(document.clone()),
            ),
            Self::ReplaceDocument {
                database,
                collection,
                key,
                document,
                ..
            } => (
                Method::Put,
                document_path(database, collection, key),
                Some(document.clone()),
            ),
            Self::UpdateDocument {
                database,
                collection,
                key,
                patch,
                ..
            } => (
                Method::Patch,
                document_path(database, collection, key),
                Some(patch.clone()),
            ),
            Self::DeleteDocument {
                database,
                collection,
                key,
                ..
            } => (
                Method::Delete,
                document_path(database, collection, key),
                None,
            ),
            Self::Query {
                database,
                query,
                bind_vars,
                batch_size,
            } => {
                let mut body = json!({ "query": query, "bindVars": bind_vars });
                if let (Some(size), Some(obj)) = (batch_size, body.as_object_mut()) {
                    obj.insert("batchSize".into(), json!(size));
                }
                (
                    Method::Post,
                    format!("{}/_api/cursor", db_prefix(database)),
                    Some(body),
                )
            }
            Self::NextBatch {
                database,
                cursor_id,
            } => (
                Method::Post,
                format!("{}/_api/cursor/{}", db_prefix(database), segment(cursor_id)),
                None,
            ),
            Self::Raw { method, path, body } => (*method, path.clone(), body.clone()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn db_prefix(database: &str) -> String {
    format!("/_db/{}", segment(database))
}

fn document_path(database: &str, collection: &str, key: &str) -> String {
    format!(
        "{}/_api/document/{}/{}",
        db_prefix(database),
        segment(collection),
        segment(key)
    )
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("invalid {kind} name: {name:?}")))
    }
}

/// Revisions are opaque server tokens: printable ASCII, no spaces.
fn validate_rev(rev: &str) -> Result<()> {
    if !rev.is_empty() && rev.chars().all(|c| c.is_ascii_graphic()) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("invalid revision: {rev:?}")))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("invalid document key: {key:?}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_request() {
        let request = Operation::Version.into_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/_api/version");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_create_database_request() {
        let request = Operation::CreateDatabase {
            name: "inventory".into(),
        }
        .into_request();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/_api/database");
        assert_eq!(request.body, Some(json!({ "name": "inventory" })));
    }

    #[test]
    fn test_create_collection_uses_type_code() {
        let request = Operation::CreateCollection {
            database: "shop".into(),
            name: "follows".into(),
            kind: CollectionKind::Edge,
        }
        .into_request();

        assert_eq!(request.path, "/_db/shop/_api/collection");
        assert_eq!(request.body, Some(json!({ "name": "follows", "type": 3 })));
    }

    #[test]
    fn test_document_key_is_percent_encoded() {
        let request = Operation::GetDocument {
            database: "shop".into(),
            collection: "users".into(),
            key: "a:b".into(),
        }
        .into_request();

        assert_eq!(request.path, "/_db/shop/_api/document/users/a%3Ab");
    }

    #[test]
    fn test_rev_becomes_if_match() {
        let request = Operation::DeleteDocument {
            database: "shop".into(),
            collection: "users".into(),
            key: "1".into(),
            rev: Some("_abc".into()),
        }
        .into_request();

        assert_eq!(request.method, Method::Delete);
        assert_eq!(
            request.headers,
            vec![("If-Match".to_string(), "_abc".to_string())]
        );
    }

    #[test]
    fn test_query_body() {
        let mut bind_vars = Map::new();
        bind_vars.insert("min".into(), json!(3));

        let request = Operation::Query {
            database: "shop".into(),
            query: "FOR u IN users FILTER u.age > @min RETURN u".into(),
            bind_vars,
            batch_size: Some(100),
        }
        .into_request();

        let body = request.body.expect("body");
        assert_eq!(body["bindVars"]["min"], 3);
        assert_eq!(body["batchSize"], 100);
        assert_eq!(request.path, "/_db/shop/_api/cursor");
    }

    #[test]
    fn test_operation_from_json() {
        let op: Operation =
            serde_json::from_value(json!({ "op": "drop_collection", "database": "d", "name": "c" }))
                .expect("decode");

        assert_eq!(
            op,
            Operation::DropCollection {
                database: "d".into(),
                name: "c".into()
            }
        );
        assert_eq!(op.name(), "drop_collection");
    }

    #[test]
    fn test_unknown_op_tag_fails() {
        let result = serde_json::from_value::<Operation>(json!({ "op": "explode" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_names() {
        assert!(
            Operation::CreateDatabase {
                name: "inventory_2".into()
            }
            .validate()
            .is_ok()
        );

        let err = Operation::CreateDatabase {
            name: "1bad".into(),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        assert!(
            Operation::ListCollections {
                database: "_system".into()
            }
            .validate()
            .is_ok()
        );

        assert!(
            Operation::GetDocument {
                database: "d".into(),
                collection: "c".into(),
                key: "has/slash".into(),
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_validate_document_must_be_object() {
        let op = Operation::CreateDocument {
            database: "d".into(),
            collection: "c".into(),
            document: json!([1, 2]),
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_raw_requires_absolute_path() {
        let op = Operation::Raw {
            method: Method::Get,
            path: "_api/version".into(),
            body: None,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_raw_path_must_be_printable() {
        for path in ["/a b", "/a\r\nGET / HTTP/1.1", "/tab\there"] {
            let op = Operation::Raw {
                method: Method::Get,
                path: path.into(),
                body: None,
            };
            assert!(op.validate().is_err(), "{path:?} accepted");
        }
    }

    #[test]
    fn test_validate_revision() {
        let delete = |rev: &str| Operation::DeleteDocument {
            database: "shop".into(),
            collection: "users".into(),
            key: "1".into(),
            rev: Some(rev.into()),
        };

        assert!(delete("_hV2oH9y---").validate().is_ok());
        assert!(delete("").validate().is_err());

        let smuggled = "_x\r\nContent-Length: 0\r\n\r\nGET /_api/version HTTP/1.1\r\nHost: h";
        assert!(matches!(
            delete(smuggled).validate(),
            Err(Error::InvalidArgument { .. })
        ));

        let replace = Operation::ReplaceDocument {
            database: "shop".into(),
            collection: "users".into(),
            key: "1".into(),
            document: json!({ "a": 1 }),
            rev: Some("bad rev".into()),
        };
        assert!(replace.validate().is_err());
    }

    #[test]
    fn test_patterns_compile() {
        assert!(NAME_PATTERN.is_match("users"));
        assert!(KEY_PATTERN.is_match("a:b"));
    }

    #[test]
    fn test_collection_kind_codes() {
        assert_eq!(CollectionKind::from_code(2), Some(CollectionKind::Document));
        assert_eq!(CollectionKind::from_code(3), Some(CollectionKind::Edge));
        assert_eq!(CollectionKind::from_code(9), None);
    }
}
