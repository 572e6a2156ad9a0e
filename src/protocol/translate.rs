//! Response translator.
//!
//! Pure mapping from `(request, raw reply)` to a typed outcome. Holds no
//! state, so the connection manager calls it inline.
//!
//! | Reply | Outcome |
//! |-------|---------|
//! | 2xx, expected shape | `Ok(Reply)` chosen by the request's [`Operation`] |
//! | 2xx, unexpected shape | [`Error::MalformedReply`] |
//! | non-2xx | [`Error::RemoteRejected`] |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

use super::reply::{CollectionInfo, CursorBatch, DatabaseInfo, DocumentMeta, VersionInfo};
use super::{CollectionKind, Operation, RawReply, Reply, Request};

// ============================================================================
// Translate
// ============================================================================

/// Translates a raw reply for `request` into a typed outcome.
///
/// # Errors
///
/// - [`Error::RemoteRejected`] if the server returned a failure status
/// - [`Error::MalformedReply`] if a success body has the wrong shape
pub fn translate(request: &Request, raw: RawReply) -> Result<Reply> {
    if !raw.is_success() {
        return Err(rejection(&raw));
    }

    let status = raw.status;
    let body = raw
        .json()
        .map_err(|e| Error::malformed_reply(status, format!("invalid JSON body: {e}")))?;

    match &request.operation {
        Operation::Version => decode(status, body).map(Reply::Version),
        Operation::ListDatabases => {
            decode::<Vec<String>>(status, result_field(status, body)?).map(Reply::Databases)
        }
        Operation::CurrentDatabase { .. } => {
            decode::<DatabaseInfo>(status, result_field(status, body)?).map(Reply::Database)
        }
        Operation::CreateDatabase { .. }
        | Operation::DropDatabase { .. }
        | Operation::DropCollection { .. } => Ok(Reply::Ack),
        Operation::ListCollections { .. } => {
            let items = result_field(status, body)?;
            let items = items.as_array().ok_or_else(|| {
                Error::malformed_reply(status, "collection list is not an array")
            })?;

            items
                .iter()
                .map(|item| collection_info(status, item))
                .collect::<Result<Vec<_>>>()
                .map(Reply::Collections)
        }
        Operation::CreateCollection { .. } | Operation::TruncateCollection { .. } => {
            collection_info(status, &body).map(Reply::Collection)
        }
        Operation::GetDocument { .. } => {
            if body.is_object() {
                Ok(Reply::Document(body))
            } else {
                Err(Error::malformed_reply(status, "document is not an object"))
            }
        }
        Operation::CreateDocument { .. }
        | Operation::ReplaceDocument { .. }
        | Operation::UpdateDocument { .. }
        | Operation::DeleteDocument { .. } => decode::<DocumentMeta>(status, body).map(Reply::DocumentMeta),
        Operation::Query { .. } | Operation::NextBatch { .. } => {
            decode::<CursorBatch>(status, body).map(Reply::Cursor)
        }
        Operation::Raw { .. } => Ok(Reply::Raw { status, body }),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a rejection from the server's error body, falling back to the
/// status line when the body is not the usual error object.
fn rejection(raw: &RawReply) -> Error {
    let body = raw.json().unwrap_or(Value::Null);

    let code = body.get("errorNum").and_then(Value::as_i64).unwrap_or(0);
    let message = body
        .get("errorMessage")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| raw.reason.clone());

    Error::remote_rejected(raw.status, code, message)
}

fn decode<T: DeserializeOwned>(status: u16, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::malformed_reply(status, e.to_string()))
}

fn result_field(status: u16, mut body: Value) -> Result<Value> {
    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| Error::malformed_reply(status, "missing `result` field"))
}

fn collection_info(status: u16, value: &Value) -> Result<CollectionInfo> {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::malformed_reply(status, format!("collection without `{key}`")))
    };

    let kind = value
        .get("type")
        .and_then(Value::as_u64)
        .and_then(CollectionKind::from_code)
        .unwrap_or_default();

    Ok(CollectionInfo {
        name: text("name")?,
        id: text("id")?,
        kind,
        is_system: value
            .get("isSystem")
            .and_then(Value::as_bool)
            .unwrap_or_default(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use serde_json::json;

    use crate::protocol::Method;

    fn raw(status: u16, body: Value) -> RawReply {
        RawReply {
            status,
            reason: "Reason".to_string(),
            body: Bytes::from(body.to_string()),
            ..Default::default()
        }
    }

    fn request(operation: Operation) -> Request {
        operation.into_request()
    }

    #[test]
    fn test_version() {
        let reply = translate(
            &request(Operation::Version),
            raw(
                200,
                json!({ "server": "arango", "version": "3.11.4", "license": "community" }),
            ),
        )
        .expect("translate");

        let Reply::Version(info) = reply else {
            panic!("expected version reply");
        };
        assert_eq!(info.version, "3.11.4");
        assert_eq!(info.license.as_deref(), Some("community"));
    }

    #[test]
    fn test_list_databases() {
        let reply = translate(
            &request(Operation::ListDatabases),
            raw(200, json!({ "error": false, "code": 200, "result": ["_system", "shop"] })),
        )
        .expect("translate");

        assert_eq!(
            reply,
            Reply::Databases(vec!["_system".to_string(), "shop".to_string()])
        );
    }

    #[test]
    fn test_create_database_is_ack() {
        let reply = translate(
            &request(Operation::CreateDatabase { name: "shop".into() }),
            raw(201, json!({ "error": false, "code": 201, "result": true })),
        )
        .expect("translate");

        assert_eq!(reply, Reply::Ack);
    }

    #[test]
    fn test_list_collections() {
        let reply = translate(
            &request(Operation::ListCollections {
                database: "shop".into(),
            }),
            raw(
                200,
                json!({ "result": [
                    { "id": "1", "name": "users", "type": 2, "isSystem": false },
                    { "id": "2", "name": "follows", "type": 3, "isSystem": false }
                ]}),
            ),
        )
        .expect("translate");

        let Reply::Collections(list) = reply else {
            panic!("expected collections");
        };
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].kind, CollectionKind::Edge);
    }

    #[test]
    fn test_document_meta() {
        let reply = translate(
            &request(Operation::CreateDocument {
                database: "shop".into(),
                collection: "users".into(),
                document: json!({ "name": "ada" }),
            }),
            raw(
                202,
                json!({ "_id": "users/1", "_key": "1", "_rev": "_h1" }),
            ),
        )
        .expect("translate");

        assert_eq!(
            reply,
            Reply::DocumentMeta(DocumentMeta {
                id: "users/1".into(),
                key: "1".into(),
                rev: "_h1".into(),
            })
        );
    }

    #[test]
    fn test_cursor_batch() {
        let reply = translate(
            &request(Operation::NextBatch {
                database: "shop".into(),
                cursor_id: "42".into(),
            }),
            raw(200, json!({ "result": [1, 2], "hasMore": true, "id": "42" })),
        )
        .expect("translate");

        let Reply::Cursor(batch) = reply else {
            panic!("expected cursor");
        };
        assert!(batch.has_more);
        assert_eq!(batch.result, vec![json!(1), json!(2)]);
        assert_eq!(batch.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_rejection_uses_error_body() {
        let err = translate(
            &request(Operation::GetDocument {
                database: "shop".into(),
                collection: "users".into(),
                key: "missing".into(),
            }),
            raw(
                404,
                json!({ "error": true, "code": 404, "errorNum": 1202, "errorMessage": "document not found" }),
            ),
        )
        .unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(
            err,
            Error::RemoteRejected { status: 404, code: 1202, ref message } if message == "document not found"
        ));
    }

    #[test]
    fn test_rejection_without_json_body() {
        let reply = RawReply {
            status: 503,
            reason: "Service Unavailable".to_string(),
            body: Bytes::from_static(b"<html>down</html>"),
            ..Default::default()
        };

        let err = translate(&request(Operation::Version), reply).unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteRejected { status: 503, code: 0, ref message } if message == "Service Unavailable"
        ));
    }

    #[test]
    fn test_malformed_success_body() {
        let err = translate(
            &request(Operation::ListDatabases),
            raw(200, json!({ "unexpected": true })),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MalformedReply { status: 200, .. }));
        assert!(!err.is_remote_rejection());
    }

    #[test]
    fn test_raw_passthrough() {
        let reply = translate(
            &request(Operation::Raw {
                method: Method::Get,
                path: "/_admin/status".into(),
                body: None,
            }),
            raw(200, json!({ "mode": "server" })),
        )
        .expect("translate");

        assert_eq!(
            reply,
            Reply::Raw {
                status: 200,
                body: json!({ "mode": "server" })
            }
        );
    }
}
