//! TCP connector.
//!
//! Each `connect` spawns one task that owns the socket for that
//! connection's whole life:
//!
//! 1. Connect with timeout, run the HTTP/1.1 handshake, report `Connected`
//!    or `ConnectFailed`
//! 2. Send queued requests one by one, collect each reply body, report `Data`
//! 3. Report `Closed` when either side ends
//!
//! `hyper` drives the connection and does the message framing. `close`
//! aborts the task; nothing is reported for a local close.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::protocol::frame::MAX_BODY_SIZE;
use crate::protocol::{Frame, RawReply};

use super::connector::{Connector, Endpoint, EventKind, EventSender, TransportEvent};

// ============================================================================
// TcpConnector
// ============================================================================

/// Connector speaking HTTP/1.1 over a plain TCP stream.
pub struct TcpConnector {
    /// Where events are reported.
    events: EventSender,
    /// Limit for establishing a connection.
    connect_timeout: Duration,
    /// Requests for the current connection.
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    /// Task owning the current connection.
    task: Option<JoinHandle<()>>,
}

impl TcpConnector {
    /// Creates a connector reporting on `events`.
    #[must_use]
    pub fn new(events: EventSender, connect_timeout: Duration) -> Self {
        Self {
            events,
            connect_timeout,
            outbound: None,
            task: None,
        }
    }

    /// Connection task body.
    async fn run_connection(
        endpoint: Endpoint,
        generation: u64,
        connect_timeout: Duration,
        outbound: mpsc::UnboundedReceiver<Frame>,
        events: EventSender,
    ) {
        let emit = |kind| {
            let _ = events.send(TransportEvent::new(generation, kind));
        };

        let address = (endpoint.host.as_str(), endpoint.port);
        let stream = match timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                emit(EventKind::ConnectFailed(e.to_string()));
                return;
            }
            Err(_) => {
                emit(EventKind::ConnectFailed(format!(
                    "timed out after {}ms",
                    connect_timeout.as_millis()
                )));
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "Failed to set TCP_NODELAY");
        }

        let (mut sender, connection) = match http1::handshake(TokioIo::new(stream)).await {
            Ok(parts) => parts,
            Err(e) => {
                emit(EventKind::ConnectFailed(format!("handshake failed: {e}")));
                return;
            }
        };

        debug!(%endpoint, generation, "TCP connection established");
        emit(EventKind::Connected);

        let reason = tokio::select! {
            result = connection => match result {
                Ok(()) => "closed by remote".to_string(),
                Err(e) => e.to_string(),
            },
            reason = Self::exchange_loop(&mut sender, outbound, &events, generation) => reason,
        };

        debug!(generation, %reason, "TCP connection ended");
        emit(EventKind::Closed(reason));
    }

    /// Sends requests in order, reporting each reply, until the outbound
    /// channel closes or the connection breaks.
    async fn exchange_loop(
        sender: &mut SendRequest<Full<Bytes>>,
        mut outbound: mpsc::UnboundedReceiver<Frame>,
        events: &EventSender,
        generation: u64,
    ) -> String {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sender.ready().await {
                return format!("connection not ready: {e}");
            }

            trace!(generation, request = %frame.request_line(), "Sending request");
            let response = match sender.send_request(frame.into_http()).await {
                Ok(response) => response,
                Err(e) => return format!("request failed: {e}"),
            };

            let (parts, body) = response.into_parts();
            let body = match Limited::new(body, MAX_BODY_SIZE).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => return format!("reading reply body failed: {e}"),
            };

            trace!(generation, status = parts.status.as_u16(), "Reply received");
            let reply = RawReply::from_parts(&parts, body);
            if events
                .send(TransportEvent::new(generation, EventKind::Data(reply)))
                .is_err()
            {
                return "event channel closed".to_string();
            }
        }

        "closed locally".to_string()
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self, endpoint: &Endpoint, generation: u64) {
        self.close();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);
        self.task = Some(tokio::spawn(Self::run_connection(
            endpoint.clone(),
            generation,
            self.connect_timeout,
            outbound_rx,
            self.events.clone(),
        )));
    }

    fn send(&mut self, frame: Frame) {
        let sent = self
            .outbound
            .as_ref()
            .is_some_and(|outbound| outbound.send(frame).is_ok());

        // A dead task means `Closed` was already reported.
        if !sent {
            warn!("Send on a connection that is not open");
        }
    }

    fn close(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TcpConnector {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
