//! Conversion between driver requests and HTTP messages.
//!
//! [`encode`] turns a [`Request`] into a [`Frame`]: method, origin-form
//! target, headers and body, checked against the HTTP grammar so a single
//! request can never become more than one message on the wire. Framing
//! itself (content length, chunking, interim replies) is left to `hyper`.
//!
//! [`RawReply::from_parts`] goes the other way for replies.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use http_body_util::Full;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

use super::{Credentials, Method, RawReply, Request};

// ============================================================================
// Constants
// ============================================================================

/// Largest accepted reply body.
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// User agent sent with every request.
const USER_AGENT_VALUE: &str = concat!("docdb-driver/", env!("CARGO_PKG_VERSION"));

const APPLICATION_JSON: &str = "application/json";

// ============================================================================
// Frame
// ============================================================================

/// One outbound HTTP request, ready for the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request method.
    pub method: http::Method,
    /// Origin-form target (`/path?query`).
    pub uri: Uri,
    /// Header block.
    pub headers: HeaderMap,
    /// Serialized JSON body, empty when the request has none.
    pub body: Bytes,
}

impl Frame {
    /// Request line as it appears on the wire, without the line break.
    #[must_use]
    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method, self.uri)
    }

    /// Header value as a string, if present and printable.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Converts into a request `hyper` can send.
    #[must_use]
    pub fn into_http(self) -> http::Request<Full<Bytes>> {
        let mut request = http::Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        request
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Builds the frame for a request.
///
/// `credentials` is the client default; the request's own credentials win.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if the target, a header name or a header
///   value is not valid HTTP (e.g. contains CR, LF or NUL)
/// - [`Error::Json`] if the body cannot be serialized
pub fn encode(request: &Request, host: &str, credentials: Option<&Credentials>) -> Result<Frame> {
    let target = request.target();
    let uri: Uri = target
        .parse()
        .map_err(|e| Error::invalid_argument(format!("invalid request target {target:?}: {e}")))?;
    if uri.scheme().is_some() || uri.authority().is_some() || !uri.path().starts_with('/') {
        return Err(Error::invalid_argument(format!(
            "request target must be an absolute path: {target:?}"
        )));
    }

    let mut headers = HeaderMap::new();
    headers.insert(HOST, header_value(HOST.as_str(), host)?);
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

    if let Some(creds) = request.credentials.as_ref().or(credentials) {
        let mut value = header_value(AUTHORIZATION.as_str(), &creds.header_value())?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &request.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::invalid_argument(format!("invalid header name {name:?}")))?;
        headers.append(header, header_value(name, value)?);
    }

    let body = match &request.body {
        Some(value) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            Bytes::from(serde_json::to_vec(value)?)
        }
        None => Bytes::new(),
    };

    Ok(Frame {
        method: request.method.into(),
        uri,
        headers,
        body,
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_argument(format!("invalid value for header {name}")))
}

// ============================================================================
// Decoding
// ============================================================================

impl RawReply {
    /// Builds a raw reply from a response head and its collected body.
    ///
    /// Repeated headers are joined with `", "`; values that are not
    /// printable are skipped.
    #[must_use]
    pub fn from_parts(parts: &http::response::Parts, body: Bytes) -> Self {
        let mut headers = FxHashMap::default();
        for (name, value) in &parts.headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|joined: &mut String| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let reason = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
            .or_else(|| parts.status.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            status: parts.status.as_u16(),
            reason,
            headers,
            body,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::Operation;

    #[test]
    fn test_encode_get_without_body() {
        let request = Operation::Version.into_request();
        let frame = encode(&request, "db.local:8529", None).expect("encode");

        assert_eq!(frame.request_line(), "GET /_api/version HTTP/1.1");
        assert_eq!(frame.header("host"), Some("db.local:8529"));
        assert_eq!(frame.header("accept"), Some("application/json"));
        assert!(frame.header("content-type").is_none());
        assert!(frame.header("authorization").is_none());
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_encode_body_and_default_credentials() {
        let request = Operation::CreateDatabase {
            name: "shop".into(),
        }
        .into_request();
        let creds = Credentials::basic("root", "secret");
        let frame = encode(&request, "h", Some(&creds)).expect("encode");

        assert_eq!(frame.header("authorization"), Some("Basic cm9vdDpzZWNyZXQ="));
        assert!(frame.headers[AUTHORIZATION].is_sensitive());
        assert_eq!(frame.header("content-type"), Some("application/json"));
        assert_eq!(frame.body, Bytes::from(json!({ "name": "shop" }).to_string()));
    }

    #[test]
    fn test_request_credentials_override_default() {
        let request = Operation::Version
            .into_request()
            .with_credentials(Credentials::bearer("tok"));
        let default = Credentials::basic("root", "secret");
        let frame = encode(&request, "h", Some(&default)).expect("encode");

        assert_eq!(frame.header("authorization"), Some("bearer tok"));
    }

    #[test]
    fn test_query_is_part_of_target() {
        let request = Operation::Version
            .into_request()
            .with_query("details", "true");
        let frame = encode(&request, "h", None).expect("encode");
        assert_eq!(frame.request_line(), "GET /_api/version?details=true HTTP/1.1");
    }

    #[test]
    fn test_line_breaks_cannot_smuggle_a_second_request() {
        let rev = "_x\r\nContent-Length: 0\r\n\r\nGET /_api/version HTTP/1.1\r\nHost: h";

        // Unvalidated path: the request goes straight to the encoder.
        let request = Operation::DeleteDocument {
            database: "shop".into(),
            collection: "users".into(),
            key: "1".into(),
            rev: Some(rev.into()),
        }
        .into_request();
        let err = encode(&request, "h", None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let request = Operation::Version
            .into_request()
            .with_header("X-Trace\r\nX-Evil", "1");
        assert!(matches!(
            encode(&request, "h", None),
            Err(Error::InvalidArgument { .. })
        ));

        let request = Operation::Version.into_request().with_header("X-Trace", "a\0b");
        assert!(matches!(
            encode(&request, "h", None),
            Err(Error::InvalidArgument { .. })
        ));

        let request = Operation::Version
            .into_request()
            .with_credentials(Credentials::bearer("tok\nX: y"));
        assert!(matches!(
            encode(&request, "h", None),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_invalid_targets_rejected() {
        for path in ["/a b", "/a\r\nGET / HTTP/1.1", "http://elsewhere/x"] {
            let request = Operation::Raw {
                method: Method::Get,
                path: path.into(),
                body: None,
            }
            .into_request();
            assert!(
                matches!(encode(&request, "h", None), Err(Error::InvalidArgument { .. })),
                "{path:?} accepted"
            );
        }
    }

    #[test]
    fn test_into_http_keeps_everything() {
        let request = Operation::CreateDatabase {
            name: "shop".into(),
        }
        .into_request();
        let frame = encode(&request, "h", None).expect("encode");

        let http_request = frame.clone().into_http();
        assert_eq!(http_request.method(), http::Method::POST);
        assert_eq!(http_request.uri(), &frame.uri);
        assert_eq!(http_request.headers(), &frame.headers);
    }

    #[test]
    fn test_raw_reply_from_parts() {
        let (parts, ()) = http::Response::builder()
            .status(404)
            .header("Content-Type", "application/json")
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body(())
            .expect("response")
            .into_parts();

        let reply = RawReply::from_parts(&parts, Bytes::from_static(b"{}"));
        assert_eq!(reply.status, 404);
        assert_eq!(reply.reason, "Not Found");
        assert_eq!(reply.header("content-type"), Some("application/json"));
        assert_eq!(reply.header("Set-Cookie"), Some("a=1, b=2"));
        assert!(!reply.is_success());
    }
}
