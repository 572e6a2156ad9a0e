//! Request/response message types and their HTTP form.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | One REST call, tagged with its [`Operation`] |
//! | `RawReply` | Remote → Local | Undecoded HTTP reply |
//! | `Reply` | Local | Typed outcome produced by [`translate`] |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Request → HTTP message, HTTP response → raw reply |
//! | `operation` | Operation catalogue and path templates |
//! | `reply` | Typed reply payloads |
//! | `request` | Request and raw reply types |
//! | `translate` | Raw reply → typed outcome |

// ============================================================================
// Submodules
// ============================================================================

/// HTTP message conversion.
pub mod frame;

/// Operation catalogue.
pub mod operation;

/// Typed reply payloads.
pub mod reply;

/// Request and raw reply types.
pub mod request;

/// Response translator.
pub mod translate;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::Frame;
pub use operation::{CollectionKind, Operation};
pub use reply::{CollectionInfo, CursorBatch, DatabaseInfo, DocumentMeta, Reply, VersionInfo};
pub use request::{Credentials, Method, RawReply, Request};
pub use translate::translate;
