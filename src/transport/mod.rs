//! Transport layer.
//!
//! This module owns the single connection to the database server and the
//! ordering engine in front of it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  Inbox   ┌──────────────┐  connect/send/close  ┌────────────┐
//! │ Client   │─────────►│ Manager      │─────────────────────►│ Connector  │──► server
//! │ handles  │◄─────────│ (worker task)│◄─────────────────────│            │◄──
//! └──────────┘ oneshot  └──────────────┘   TransportEvent     └────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connector` | Connector trait, endpoint and event types |
//! | `manager` | Queue, state machine and worker loop |
//! | `memory` | In-memory connector for tests |
//! | `tcp` | TCP connector |

// ============================================================================
// Submodules
// ============================================================================

/// Connector contract.
pub mod connector;

/// Connection manager.
pub(crate) mod manager;

/// In-memory connector.
pub mod memory;

/// TCP connector.
pub mod tcp;

// ============================================================================
// Re-exports
// ============================================================================

pub use connector::{Connector, Endpoint, EventKind, EventReceiver, EventSender, TransportEvent};
pub use memory::{ConnectorAction, MemoryConnector, MemoryHandle};
pub use tcp::TcpConnector;
