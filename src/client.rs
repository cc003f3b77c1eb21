// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The outbound side of a QUIC application.
//!
//! Grounded on `msquic_client.cpp`: a single outbound connection, a connection callback that
//! (unlike the server's) accepts a peer-initiated stream, and a fully worked-out `disconnect`
//! path (the source project leaves disconnect stubbed out; this is a deliberate fix, not a
//! feature carried over unfinished).

use std::sync::{Arc, Mutex};

use log::info;

use crate::backend::{ConnectionEvent, QuicBackend};
use crate::config::QuicConfiguration;
use crate::connection::{Connection, StreamCallbacks};
use crate::dispatcher::{self, CallbackTable};
use crate::error::{QuicErrorCode, Result};
use crate::handle::RawHandle;
use crate::handle_map::HandleContextMap;

/// An outbound QUIC connection to a single remote endpoint.
///
/// Constructed through [`crate::application::Application::make_client`]. A `Client` tracks at
/// most one connection at a time; reconnecting after [`Client::disconnect`] is a fresh
/// [`Client::connect`] call.
pub struct Client {
    backend: Arc<dyn QuicBackend>,
    config: QuicConfiguration,
    connection_handle: Mutex<Option<RawHandle>>,
    connections: HandleContextMap<RawHandle, Connection>,
    pub callbacks: CallbackTable,
}

impl Client {
    pub(crate) fn new(backend: Arc<dyn QuicBackend>, config: QuicConfiguration) -> Self {
        Self {
            backend,
            config,
            connection_handle: Mutex::new(None),
            connections: HandleContextMap::new(),
            callbacks: CallbackTable::default(),
        }
    }

    /// Starts connecting to `host:port`. Fails with `client_already_connected` if a connection
    /// attempt (or an established connection) already exists.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let mut slot = self.connection_handle.lock().expect("connection lock poisoned");
        if slot.is_some() {
            return Err(QuicErrorCode::ClientAlreadyConnected);
        }
        let handle = self.backend.open_connection(&self.config, host, port)?;
        *slot = Some(handle);
        info!("connecting to {host}:{port}");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_handle
            .lock()
            .expect("connection lock poisoned")
            .map(|h| self.connections.contains(h))
            .unwrap_or(false)
    }

    fn handle(&self) -> Option<RawHandle> {
        *self.connection_handle.lock().expect("connection lock poisoned")
    }

    /// This client's connection handle, once [`Client::connect`] has been called.
    pub fn connection_handle(&self) -> Option<RawHandle> {
        self.handle()
    }

    /// True if the live connection owns a stream with handle `stream`.
    pub fn has_stream(&self, stream: RawHandle) -> bool {
        let Some(connection_handle) = self.handle() else { return false };
        self.connections
            .with(connection_handle, |conn| conn.streams().contains(stream))
            .unwrap_or(false)
    }

    /// Drains pending backend events for this client's connection and its streams.
    pub fn poll(&self) {
        let Some(connection_handle) = self.handle() else { return };

        for event in self.backend.poll_connection_events(connection_handle) {
            let was_shutdown = matches!(event, ConnectionEvent::ShutdownComplete { .. });
            dispatcher::dispatch_connection_event(
                self.backend.as_ref(),
                &self.connections,
                &self.callbacks,
                connection_handle,
                event,
                true,
                self.config.stream_receive_buffer as usize,
            );
            if was_shutdown {
                *self.connection_handle.lock().expect("connection lock poisoned") = None;
            }
        }

        let Some(connection_handle) = self.handle() else { return };
        let stream_handles = self
            .connections
            .with(connection_handle, |conn| conn.streams().keys())
            .unwrap_or_default();
        self.connections.with(connection_handle, |conn| {
            for stream_handle in &stream_handles {
                for event in self.backend.poll_stream_events(*stream_handle) {
                    dispatcher::dispatch_stream_event(
                        self.backend.as_ref(),
                        conn,
                        *stream_handle,
                        event,
                    );
                }
            }
        });
    }

    /// Opens a new stream on the live connection.
    pub fn open_stream(&self, callbacks: StreamCallbacks) -> Result<RawHandle> {
        let connection_handle = self.handle().ok_or(QuicErrorCode::ClientNotConnected)?;
        self.connections
            .with(connection_handle, |conn| {
                conn.open_stream(
                    self.backend.as_ref(),
                    self.config.stream_receive_buffer as usize,
                    callbacks,
                )
            })
            .ok_or(QuicErrorCode::ClientNotConnected)?
    }

    /// Sends `payload` on `stream`. Returns the submitted wire size (`encoded_length + 4`) on
    /// success.
    pub fn send(&self, stream: RawHandle, payload: &[u8]) -> Result<usize> {
        let connection_handle = self.handle().ok_or(QuicErrorCode::ClientNotConnected)?;
        self.connections
            .with(connection_handle, |conn| conn.send(self.backend.as_ref(), stream, payload))
            .ok_or(QuicErrorCode::ClientNotConnected)?
    }

    /// Number of `SendBuffer`s submitted on `stream` that haven't yet been confirmed by a
    /// `SendComplete` event.
    pub fn in_flight_send_count(&self, stream: RawHandle) -> usize {
        let Some(connection_handle) = self.handle() else { return 0 };
        self.connections
            .with(connection_handle, |conn| {
                conn.streams().with(stream, |s| s.in_flight_sends().len()).unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Requests a graceful shutdown of the live connection. Fails with `client_not_connected` if
    /// there is no connection to disconnect. The connection's state is fully cleared once the
    /// backend's matching `ShutdownComplete` event is drained by a later [`Client::poll`] call.
    pub fn disconnect(&self) -> Result<()> {
        let handle = self.handle().ok_or(QuicErrorCode::ClientNotConnected)?;
        self.backend.shutdown_connection(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::{QuicImplType, Role};

    fn client_with(backend: Arc<MockBackend>) -> Client {
        Client::new(backend, QuicConfiguration::new(QuicImplType::MsQuic, Role::Client))
    }

    #[test]
    fn connecting_twice_fails_with_already_connected() {
        let client = client_with(Arc::new(MockBackend::new()));
        client.connect("localhost", 6666).unwrap();
        assert_eq!(
            client.connect("localhost", 6666),
            Err(QuicErrorCode::ClientAlreadyConnected)
        );
    }

    #[test]
    fn disconnect_without_a_connection_fails() {
        let client = client_with(Arc::new(MockBackend::new()));
        assert_eq!(client.disconnect(), Err(QuicErrorCode::ClientNotConnected));
    }

    #[test]
    fn poll_establishes_the_connection_and_disconnect_tears_it_down() {
        let backend = Arc::new(MockBackend::new());
        let client = client_with(backend.clone());
        client.connect("localhost", 6666).unwrap();
        let handle = client.handle().unwrap();
        backend.push_connection_event(handle, ConnectionEvent::Connected);

        client.poll();
        assert!(client.is_connected());

        client.disconnect().unwrap();
        client.poll();
        assert!(!client.is_connected());
        assert_eq!(client.handle(), None);
    }

    #[test]
    fn peer_initiated_stream_is_accepted_on_a_client() {
        let backend = Arc::new(MockBackend::new());
        let client = client_with(backend.clone());
        client.connect("localhost", 6666).unwrap();
        let handle = client.handle().unwrap();
        backend.push_connection_event(handle, ConnectionEvent::Connected);
        client.poll();

        let peer_stream = RawHandle::fresh();
        backend
            .push_connection_event(handle, ConnectionEvent::PeerStreamStarted { stream: peer_stream });
        client.poll();

        client
            .connections
            .with(handle, |conn| assert!(conn.streams().contains(peer_stream)));
    }
}
