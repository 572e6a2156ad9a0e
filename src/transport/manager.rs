//! Connection manager and its worker loop.
//!
//! The manager owns the request queue, the one connection, and the state
//! flag. It sends at most one request at a time and answers requesters in
//! submission order. Because only one request is ever outstanding, the
//! reply that arrives always belongs to the request sent last; no
//! correlation id is needed.
//!
//! # States
//!
//! ```text
//!   submit                 Connected              dispatch
//! Disconnected ──► Connecting ──────► Ready ◄──────────────► Busy
//!      ▲               │                        reply/failure
//!      └───────────────┴── ConnectFailed / Closed / timeout ──┘
//! ```
//!
//! # Worker
//!
//! [`run`] owns the manager by value and handles one event at a time:
//! client messages, transport events, and the in-flight deadline. Each
//! handler returns without waiting on I/O.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, trace, warn};

use crate::client::Config;
use crate::error::{Error, Result};
use crate::protocol::{Credentials, Operation, RawReply, Reply, Request, frame, translate};

use super::connector::{Connector, Endpoint, EventKind, EventReceiver, TransportEvent};

// ============================================================================
// Types
// ============================================================================

/// Where an outcome is delivered.
pub(crate) type ReplyTo = oneshot::Sender<Result<Reply>>;

/// Messages from clients to the worker.
pub(crate) enum Inbox {
    /// Queue a request.
    Submit {
        request: Request,
        reply_to: ReplyTo,
    },
    /// Decode an untyped message as an operation, then queue it.
    Untyped { message: Value, reply_to: ReplyTo },
    /// Stop the worker.
    Shutdown,
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// No connection exists or has been requested.
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Connected and idle.
    Ready,
    /// Connected with one request awaiting its reply.
    Busy,
}

// ============================================================================
// PendingEntry
// ============================================================================

/// A request paired with its requester.
struct PendingEntry {
    /// Submission order, for logs and timeout errors.
    sequence: u64,
    request: Request,
    reply_to: ReplyTo,
}

impl PendingEntry {
    fn deliver(self, outcome: Result<Reply>) {
        if let Err(e) = &outcome {
            debug!(sequence = self.sequence, error = %e, "Delivering failure");
        }
        if self.reply_to.send(outcome).is_err() {
            trace!(sequence = self.sequence, "Requester gone, outcome dropped");
        }
    }
}

/// The one request currently on the wire.
struct InFlight {
    entry: PendingEntry,
    deadline: Option<Instant>,
}

// ============================================================================
// Manager
// ============================================================================

/// Queue and connection state machine.
pub(crate) struct Manager<C> {
    connector: C,
    endpoint: Endpoint,
    host: String,
    credentials: Option<Credentials>,
    request_timeout: Option<Duration>,

    state: ConnectionState,
    queue: VecDeque<PendingEntry>,
    in_flight: Option<InFlight>,

    /// Bumped on every connect and close; events from older connections are dropped.
    generation: u64,
    next_sequence: u64,
    unmatched: u64,
}

impl<C: Connector> Manager<C> {
    /// Creates a manager in the `Disconnected` state.
    pub(crate) fn new(connector: C, config: &Config) -> Self {
        Self {
            connector,
            host: config.endpoint.host_header(),
            endpoint: config.endpoint.clone(),
            credentials: config.credentials.clone(),
            request_timeout: config.request_timeout,
            state: ConnectionState::Disconnected,
            queue: VecDeque::new(),
            in_flight: None,
            generation: 0,
            next_sequence: 0,
            unmatched: 0,
        }
    }

    /// Current state.
    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of entries waiting to be sent.
    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Replies that arrived with nothing in flight.
    #[cfg(test)]
    pub(crate) fn unmatched_replies(&self) -> u64 {
        self.unmatched
    }

    /// Deadline of the in-flight request, if any.
    #[inline]
    fn deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().and_then(|f| f.deadline)
    }

    // ========================================================================
    // Client Events
    // ========================================================================

    /// Appends a request; connects or dispatches as the state allows.
    pub(crate) fn submit(&mut self, request: Request, reply_to: ReplyTo) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        trace!(
            sequence,
            operation = request.operation.name(),
            state = ?self.state,
            "Request queued"
        );

        self.queue.push_back(PendingEntry {
            sequence,
            request,
            reply_to,
        });

        match self.state {
            ConnectionState::Disconnected => self.connect(),
            ConnectionState::Ready => self.dispatch(),
            ConnectionState::Connecting | ConnectionState::Busy => {}
        }
    }

    /// Decodes an untyped message; answers at once if it is not a request.
    pub(crate) fn submit_untyped(&mut self, message: Value, reply_to: ReplyTo) {
        let operation = match serde_json::from_value::<Operation>(message) {
            Ok(operation) => operation,
            Err(e) => {
                warn!(error = %e, "Unrecognized message from client");
                let _ = reply_to.send(Err(Error::unrecognized_request(e.to_string())));
                return;
            }
        };

        if let Err(e) = operation.validate() {
            let _ = reply_to.send(Err(e));
            return;
        }

        self.submit(operation.into_request(), reply_to);
    }

    /// Closes the connection if one was requested and cancels all pending work.
    pub(crate) fn shutdown(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.close_connection();
        }

        let cancelled = self.queue.len() + usize::from(self.in_flight.is_some());
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.entry.deliver(Err(Error::Cancelled));
        }
        for entry in self.queue.drain(..) {
            entry.deliver(Err(Error::Cancelled));
        }

        debug!(cancelled, "Connection manager shut down");
    }

    // ========================================================================
    // Transport Events
    // ========================================================================

    /// Applies one transport event.
    pub(crate) fn on_event(&mut self, event: TransportEvent) {
        if event.generation != self.generation {
            debug!(
                generation = event.generation,
                current = self.generation,
                "Dropping event from a previous connection"
            );
            return;
        }

        match event.kind {
            EventKind::Connected => self.on_connected(),
            EventKind::Data(raw) => self.on_data(raw),
            EventKind::Failure(reason) => self.on_failure(reason),
            EventKind::ConnectFailed(reason) => self.on_connect_failed(reason),
            EventKind::Closed(reason) => self.on_closed(reason),
        }
    }

    fn on_connected(&mut self) {
        match self.state {
            ConnectionState::Connecting => {
                debug!(endpoint = %self.endpoint, "Connected");
                self.state = ConnectionState::Ready;
                self.dispatch();
            }
            ConnectionState::Ready | ConnectionState::Busy => {
                trace!("Duplicate connect confirmation");
            }
            ConnectionState::Disconnected => {
                warn!("Connect confirmation while disconnected");
            }
        }
    }

    fn on_data(&mut self, raw: RawReply) {
        let Some(in_flight) = self.in_flight.take() else {
            self.unmatched += 1;
            error!(
                error = %Error::protocol_confusion(format!(
                    "reply with status {} and no request in flight",
                    raw.status
                )),
                state = ?self.state,
                unmatched = self.unmatched,
                "Unmatched reply"
            );
            return;
        };

        trace!(
            sequence = in_flight.entry.sequence,
            status = raw.status,
            "Reply matched"
        );

        let outcome = translate(&in_flight.entry.request, raw);
        in_flight.entry.deliver(outcome);

        self.state = ConnectionState::Ready;
        self.dispatch();
    }

    fn on_failure(&mut self, reason: String) {
        let Some(in_flight) = self.in_flight.take() else {
            warn!(%reason, "Transport failure with no request in flight");
            return;
        };

        let request = in_flight.entry.request.clone();
        in_flight
            .entry
            .deliver(Err(Error::transport(reason, request)));

        self.state = ConnectionState::Ready;
        self.dispatch();
    }

    fn on_connect_failed(&mut self, reason: String) {
        warn!(endpoint = %self.endpoint, %reason, queued = self.queue.len(), "Connect failed");

        self.state = ConnectionState::Disconnected;
        for entry in self.queue.drain(..) {
            let request = entry.request.clone();
            entry.deliver(Err(Error::transport(
                format!("connect to {} failed: {reason}", self.endpoint),
                request,
            )));
        }
    }

    fn on_closed(&mut self, reason: String) {
        debug!(%reason, state = ?self.state, "Connection closed");

        self.state = ConnectionState::Disconnected;
        self.generation += 1;

        if let Some(in_flight) = self.in_flight.take() {
            let request = in_flight.entry.request.clone();
            in_flight
                .entry
                .deliver(Err(Error::transport(format!("connection closed: {reason}"), request)));
        }

        if !self.queue.is_empty() {
            self.connect();
        }
    }

    /// Expires the in-flight request if its deadline has passed.
    pub(crate) fn on_timeout(&mut self, now: Instant) {
        let expired = self.deadline().is_some_and(|deadline| deadline <= now);
        if !expired {
            return;
        }

        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        let timeout_ms = self
            .request_timeout
            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        let sequence = in_flight.entry.sequence;
        warn!(sequence, timeout_ms, "Request timed out, dropping connection");
        in_flight
            .entry
            .deliver(Err(Error::request_timeout(sequence, timeout_ms)));

        // A late reply must not be read as the answer to the next request.
        self.close_connection();

        if !self.queue.is_empty() {
            self.connect();
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    fn connect(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        debug!(endpoint = %self.endpoint, generation = self.generation, "Connecting");
        self.connector.connect(&self.endpoint, self.generation);
    }

    fn close_connection(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        self.connector.close();
    }

    /// Sends the queue head if the connection is idle.
    fn dispatch(&mut self) {
        while self.state == ConnectionState::Ready {
            let Some(entry) = self.queue.pop_front() else {
                return;
            };

            let frame = match frame::encode(&entry.request, &self.host, self.credentials.as_ref()) {
                Ok(frame) => frame,
                Err(e) => {
                    entry.deliver(Err(e));
                    continue;
                }
            };

            trace!(
                sequence = entry.sequence,
                operation = entry.request.operation.name(),
                bytes = frame.body.len(),
                "Sending request"
            );

            self.connector.send(frame);
            self.in_flight = Some(InFlight {
                entry,
                deadline: self.request_timeout.map(|t| Instant::now() + t),
            });
            self.state = ConnectionState::Busy;
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Runs the manager until shutdown or until every client handle is gone.
pub(crate) async fn run<C: Connector>(
    mut manager: Manager<C>,
    mut inbox: mpsc::UnboundedReceiver<Inbox>,
    mut events: EventReceiver,
) {
    loop {
        let deadline = manager.deadline();

        tokio::select! {
            message = inbox.recv() => match message {
                Some(Inbox::Submit { request, reply_to }) => manager.submit(request, reply_to),
                Some(Inbox::Untyped { message, reply_to }) => {
                    manager.submit_untyped(message, reply_to);
                }
                Some(Inbox::Shutdown) | None => {
                    manager.shutdown();
                    break;
                }
            },

            Some(event) = events.recv() => manager.on_event(event),

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                manager.on_timeout(Instant::now());
            }
        }
    }

    debug!("Worker terminated");
}

// ============================================================================
// Tests
// ============================================================================
