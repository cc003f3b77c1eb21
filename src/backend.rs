// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The boundary between Nexus and the underlying QUIC stack.
//!
//! Nexus does not implement the QUIC protocol itself; it assumes an existing stack exposing
//! open/close/start/send/receive primitives with event callbacks. This module is that boundary,
//! made concrete as a trait rather than left implicit, so that [`crate::dispatcher`] and the rest
//! of the facade can be exercised in tests against [`MockBackend`] instead of a real network
//! stack.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::QuicConfiguration;
use crate::error::{QuicErrorCode, Result};
use crate::handle::RawHandle;

/// Events raised for a connection. Named and shaped after the underlying stack's own connection
/// event switch.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected,
    ShutdownComplete { app_close_in_progress: bool },
    PeerStreamStarted { stream: RawHandle },
}

/// Events raised for a stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// One or more buffers of raw bytes arrived. Buffers are delivered as a list, mirroring how
    /// a real QUIC stack may hand over several discontiguous receive buffers in one event.
    Receive { buffers: Vec<Vec<u8>> },
    /// A previously submitted send, tagged with `context`, is no longer in use by the stack.
    SendComplete { context: u64 },
    ShutdownComplete { app_close_in_progress: bool },
}

/// The primitives an underlying QUIC stack must expose for Nexus to drive it.
///
/// Every method is synchronous from the caller's point of view: it either submits work to the
/// stack and returns immediately (API calls are non-blocking), or performs a simple local
/// bookkeeping action. Events flow the other way, out of the
/// backend, through whatever mechanism a concrete implementation uses (a background thread for a
/// real stack; direct queuing for [`MockBackend`]).
pub trait QuicBackend: Send + Sync {
    /// Opens a listener bound to `port` with the given `alpn`. Distinct from `listen`-the-verb on
    /// [`crate::server::Server`]: this is the backend-level primitive it calls into.
    fn open_listener(&self, cfg: &QuicConfiguration, alpn: &str, port: u16) -> Result<RawHandle>;

    fn close_listener(&self, listener: RawHandle);

    /// Drains connection handles newly accepted on `listener` since the last call. Each accepted
    /// handle then has its own event stream reachable through
    /// [`QuicBackend::poll_connection_events`], starting with (eventually) a `Connected` or
    /// `ShutdownComplete` event.
    fn poll_listener_events(&self, listener: RawHandle) -> Vec<RawHandle>;

    /// Starts connecting to `target:port`. The eventual CONNECTED/SHUTDOWN_COMPLETE events for
    /// the returned handle arrive through [`QuicBackend::poll_connection_events`].
    fn open_connection(&self, cfg: &QuicConfiguration, target: &str, port: u16) -> Result<RawHandle>;

    /// Requests a graceful shutdown of `connection`. The confirming SHUTDOWN_COMPLETE event still
    /// arrives asynchronously.
    fn shutdown_connection(&self, connection: RawHandle);

    fn close_connection(&self, connection: RawHandle);

    fn open_stream(&self, connection: RawHandle) -> Result<RawHandle>;

    fn start_stream(&self, stream: RawHandle) -> Result<()>;

    fn close_stream(&self, stream: RawHandle);

    /// Submits `data` for sending on `stream`. `context` is echoed back in the matching
    /// `StreamEvent::SendComplete` so the dispatcher can find the in-flight `SendBuffer` again.
    fn send(&self, stream: RawHandle, data: &[u8], context: u64) -> Result<()>;

    /// Drains any connection events queued for `connection` since the last call. Returns an
    /// empty vector if none are pending.
    fn poll_connection_events(&self, connection: RawHandle) -> Vec<ConnectionEvent>;

    /// Drains any stream events queued for `stream` since the last call.
    fn poll_stream_events(&self, stream: RawHandle) -> Vec<StreamEvent>;
}

/// An in-memory [`QuicBackend`] used by the test suite. Every "network" operation is local
/// bookkeeping; events are queued by test code (via [`MockBackend::push_connection_event`] /
/// [`MockBackend::push_stream_event`]) rather than arriving from a real wire, which is what lets
/// the dispatcher and framer be exercised deterministically.
#[derive(Default)]
pub struct MockBackend {
    connection_events: Mutex<std::collections::HashMap<RawHandle, VecDeque<ConnectionEvent>>>,
    stream_events: Mutex<std::collections::HashMap<RawHandle, VecDeque<StreamEvent>>>,
    listener_events: Mutex<std::collections::HashMap<RawHandle, VecDeque<RawHandle>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connection_event(&self, connection: RawHandle, event: ConnectionEvent) {
        self.connection_events
            .lock()
            .unwrap()
            .entry(connection)
            .or_default()
            .push_back(event);
    }

    pub fn push_stream_event(&self, stream: RawHandle, event: StreamEvent) {
        self.stream_events
            .lock()
            .unwrap()
            .entry(stream)
            .or_default()
            .push_back(event);
    }

    /// Test helper simulating a new inbound connection arriving on `listener`.
    pub fn push_listener_event(&self, listener: RawHandle, accepted_connection: RawHandle) {
        self.listener_events
            .lock()
            .unwrap()
            .entry(listener)
            .or_default()
            .push_back(accepted_connection);
    }
}

impl QuicBackend for MockBackend {
    fn open_listener(&self, _cfg: &QuicConfiguration, _alpn: &str, _port: u16) -> Result<RawHandle> {
        Ok(RawHandle::fresh())
    }

    fn close_listener(&self, _listener: RawHandle) {}

    fn poll_listener_events(&self, listener: RawHandle) -> Vec<RawHandle> {
        self.listener_events
            .lock()
            .unwrap()
            .get_mut(&listener)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    fn open_connection(
        &self,
        _cfg: &QuicConfiguration,
        _target: &str,
        _port: u16,
    ) -> Result<RawHandle> {
        Ok(RawHandle::fresh())
    }

    fn shutdown_connection(&self, connection: RawHandle) {
        self.push_connection_event(
            connection,
            ConnectionEvent::ShutdownComplete {
                app_close_in_progress: true,
            },
        );
    }

    fn close_connection(&self, _connection: RawHandle) {}

    fn open_stream(&self, _connection: RawHandle) -> Result<RawHandle> {
        Ok(RawHandle::fresh())
    }

    fn start_stream(&self, _stream: RawHandle) -> Result<()> {
        Ok(())
    }

    fn close_stream(&self, _stream: RawHandle) {}

    fn send(&self, stream: RawHandle, data: &[u8], context: u64) -> Result<()> {
        if data.is_empty() {
            return Err(QuicErrorCode::SendFailed);
        }
        self.push_stream_event(stream, StreamEvent::SendComplete { context });
        Ok(())
    }

    fn poll_connection_events(&self, connection: RawHandle) -> Vec<ConnectionEvent> {
        self.connection_events
            .lock()
            .unwrap()
            .get_mut(&connection)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    fn poll_stream_events(&self, stream: RawHandle) -> Vec<StreamEvent> {
        self.stream_events
            .lock()
            .unwrap()
            .get_mut(&stream)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QuicImplType, Role};

    #[test]
    fn mock_backend_echoes_queued_events_back_out() {
        let backend = MockBackend::new();
        let cfg = QuicConfiguration::new(QuicImplType::MsQuic, Role::Client);
        let conn = backend.open_connection(&cfg, "localhost", 6666).unwrap();
        backend.push_connection_event(conn, ConnectionEvent::Connected);
        let events = backend.poll_connection_events(conn);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ConnectionEvent::Connected));
        assert!(backend.poll_connection_events(conn).is_empty());
    }

    #[test]
    fn send_of_empty_payload_fails() {
        let backend = MockBackend::new();
        assert_eq!(
            backend.send(RawHandle::fresh(), &[], 1),
            Err(QuicErrorCode::SendFailed)
        );
    }
}
