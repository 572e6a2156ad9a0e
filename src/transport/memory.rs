//! In-memory connector.
//!
//! Records every action the manager takes and lets the caller play the
//! remote side by emitting events by hand. Used to test code built on the
//! driver without a server.
//!
//! # Example
//!
//! ```ignore
//! let client = Client::builder()
//!     .build_with_connector(|events| MemoryConnector::new(events).0)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::protocol::{Frame, RawReply};

use super::connector::{Connector, Endpoint, EventKind, EventSender, TransportEvent};

// ============================================================================
// ConnectorAction
// ============================================================================

/// One call the manager made on the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorAction {
    /// `connect` was called.
    Connect {
        /// Target endpoint.
        endpoint: Endpoint,
        /// Connection generation.
        generation: u64,
    },
    /// `send` was called with this frame.
    Send(Frame),
    /// `close` was called.
    Close,
}

/// State shared between the connector and its handle.
#[derive(Debug, Default)]
struct Shared {
    actions: Vec<ConnectorAction>,
    generation: u64,
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector with no network behind it.
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnector {
    /// Creates a connector and the handle that drives it.
    #[must_use]
    pub fn new(events: EventSender) -> (Self, MemoryHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = MemoryHandle {
            shared: Arc::clone(&shared),
            events,
        };
        (Self { shared }, handle)
    }
}

impl Connector for MemoryConnector {
    fn connect(&mut self, endpoint: &Endpoint, generation: u64) {
        let mut shared = self.shared.lock();
        shared.generation = generation;
        shared.actions.push(ConnectorAction::Connect {
            endpoint: endpoint.clone(),
            generation,
        });
    }

    fn send(&mut self, frame: Frame) {
        self.shared.lock().actions.push(ConnectorAction::Send(frame));
    }

    fn close(&mut self) {
        self.shared.lock().actions.push(ConnectorAction::Close);
    }
}

// ============================================================================
// MemoryHandle
// ============================================================================

/// Remote side of a [`MemoryConnector`].
#[derive(Clone)]
pub struct MemoryHandle {
    shared: Arc<Mutex<Shared>>,
    events: EventSender,
}

impl MemoryHandle {
    /// All actions so far, oldest first.
    #[must_use]
    pub fn actions(&self) -> Vec<ConnectorAction> {
        self.shared.lock().actions.clone()
    }

    /// Frames sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        self.shared
            .lock()
            .actions
            .iter()
            .filter_map(|action| match action {
                ConnectorAction::Send(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `connect` calls so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.count(|action| matches!(action, ConnectorAction::Connect { .. }))
    }

    /// Number of `close` calls so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.count(|action| matches!(action, ConnectorAction::Close))
    }

    /// Generation of the most recent `connect`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Emits an event for the most recent connection.
    ///
    /// Returns `false` once the manager is gone.
    pub fn emit(&self, kind: EventKind) -> bool {
        self.events
            .send(TransportEvent::new(self.generation(), kind))
            .is_ok()
    }

    /// Emits `Connected`.
    pub fn connected(&self) -> bool {
        self.emit(EventKind::Connected)
    }

    /// Emits a reply with a JSON body.
    pub fn reply(&self, status: u16, body: serde_json::Value) -> bool {
        self.emit(EventKind::Data(RawReply {
            status,
            reason: String::new(),
            body: Bytes::from(body.to_string()),
            ..Default::default()
        }))
    }

    fn count(&self, predicate: impl Fn(&ConnectorAction) -> bool) -> usize {
        self.shared
            .lock()
            .actions
            .iter()
            .filter(|action| predicate(action))
            .count()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::protocol::{Operation, frame};

    #[test]
    fn test_records_actions() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (mut connector, handle) = MemoryConnector::new(tx);

        connector.connect(&Endpoint::new("h", 1), 4);
        let version = frame::encode(&Operation::Version.into_request(), "h", None).expect("encode");
        connector.send(version.clone());
        connector.close();

        assert_eq!(handle.connect_count(), 1);
        assert_eq!(handle.close_count(), 1);
        assert_eq!(handle.generation(), 4);
        assert_eq!(handle.sent(), vec![version]);
    }

    #[test]
    fn test_emit_uses_latest_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut connector, handle) = MemoryConnector::new(tx);

        connector.connect(&Endpoint::new("h", 1), 9);
        assert!(handle.connected());

        let event = rx.try_recv().expect("event");
        assert_eq!(event.generation, 9);
        assert!(matches!(event.kind, EventKind::Connected));
    }
}
