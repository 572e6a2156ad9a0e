//! Client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Cloneable handle; typed calls and raw submission |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`Config`] | Validated configuration |
//! | [`PendingReply`] | Outcome of a fire-and-forget submission |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Resolved configuration and defaults.
pub mod config;

/// Client handle.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use config::Config;
pub use core::{Client, PendingReply};
