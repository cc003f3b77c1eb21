// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The listening side of a QUIC application.
//!
//! Grounded on `msquic_server.cpp`: one listener, a map of live connections, a connection
//! callback that registers on CONNECTED and rejects any stream the peer opens unsolicited, and a
//! shutdown path that tears down every live connection before releasing the listener itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::info;

use crate::backend::QuicBackend;
use crate::config::QuicConfiguration;
use crate::connection::Connection;
use crate::dispatcher::{self, CallbackTable};
use crate::error::{QuicErrorCode, Result};
use crate::handle::RawHandle;
use crate::handle_map::HandleContextMap;

/// A listening QUIC endpoint accepting inbound connections.
///
/// Constructed through [`crate::application::Application::make_server`] rather than directly, so
/// it always shares the owning application's backend and configuration.
pub struct Server {
    backend: Arc<dyn QuicBackend>,
    config: QuicConfiguration,
    listener: Mutex<Option<RawHandle>>,
    tracked_connections: Mutex<Vec<RawHandle>>,
    connections: HandleContextMap<RawHandle, Connection>,
    listening: AtomicBool,
    pub callbacks: CallbackTable,
}

impl Server {
    pub(crate) fn new(backend: Arc<dyn QuicBackend>, config: QuicConfiguration) -> Self {
        Self {
            backend,
            config,
            listener: Mutex::new(None),
            tracked_connections: Mutex::new(Vec::new()),
            connections: HandleContextMap::new(),
            listening: AtomicBool::new(false),
            callbacks: CallbackTable::default(),
        }
    }

    /// Validates the configuration and opens a listener on `port` for `alpn`.
    ///
    /// Fails with `already_listening` if called twice on the same `Server` without an
    /// intervening shutdown.
    pub fn listen(&self, alpn: &str, port: u16) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(QuicErrorCode::AlreadyListening);
        }
        self.config.validate()?;
        match self.backend.open_listener(&self.config, alpn, port) {
            Ok(handle) => {
                *self.listener.lock().expect("listener lock poisoned") = Some(handle);
                info!("listening on port {port} with alpn {alpn}");
                Ok(())
            }
            Err(e) => {
                self.listening.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Drains every pending backend event for this server's listener, its known connections, and
    /// their streams, dispatching each one in turn.
    ///
    /// A production backend would deliver these through its own callback threads; `poll` exists
    /// so [`crate::backend::MockBackend`]-backed tests (and any backend that prefers a pull model)
    /// can drive the dispatcher deterministically.
    pub fn poll(&self) {
        let listener = *self.listener.lock().expect("listener lock poisoned");
        let Some(listener) = listener else { return };

        for accepted in self.backend.poll_listener_events(listener) {
            self.tracked_connections
                .lock()
                .expect("tracked connections lock poisoned")
                .push(accepted);
        }

        let tracked = self
            .tracked_connections
            .lock()
            .expect("tracked connections lock poisoned")
            .clone();

        for connection_handle in tracked {
            for event in self.backend.poll_connection_events(connection_handle) {
                let was_shutdown = matches!(event, crate::backend::ConnectionEvent::ShutdownComplete { .. });
                dispatcher::dispatch_connection_event(
                    self.backend.as_ref(),
                    &self.connections,
                    &self.callbacks,
                    connection_handle,
                    event,
                    false,
                    self.config.stream_receive_buffer as usize,
                );
                if was_shutdown {
                    self.tracked_connections
                        .lock()
                        .expect("tracked connections lock poisoned")
                        .retain(|h| *h != connection_handle);
                }
            }

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
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// This server's listener handle, once [`Server::listen`] has succeeded.
    pub fn listener_handle(&self) -> Option<RawHandle> {
        *self.listener.lock().expect("listener lock poisoned")
    }

    /// True if `connection` is live and owns a stream with handle `stream`.
    pub fn has_stream(&self, connection: RawHandle, stream: RawHandle) -> bool {
        self.connections
            .with(connection, |conn| conn.streams().contains(stream))
            .unwrap_or(false)
    }

    /// Opens a new stream on `connection`, one of this server's currently live connections.
    pub fn open_stream(
        &self,
        connection: RawHandle,
        callbacks: crate::connection::StreamCallbacks,
    ) -> Result<RawHandle> {
        self.connections
            .with(connection, |conn| {
                conn.open_stream(
                    self.backend.as_ref(),
                    self.config.stream_receive_buffer as usize,
                    callbacks,
                )
            })
            .ok_or(QuicErrorCode::ValueDoesNotExist)?
    }

    /// Sends `payload` on `stream`, which must belong to `connection`. Returns the submitted
    /// wire size (`encoded_length + 4`) on success.
    pub fn send(&self, connection: RawHandle, stream: RawHandle, payload: &[u8]) -> Result<usize> {
        self.connections
            .with(connection, |conn| conn.send(self.backend.as_ref(), stream, payload))
            .ok_or(QuicErrorCode::ValueDoesNotExist)?
    }

    /// Number of `SendBuffer`s submitted on `stream` that haven't yet been confirmed by a
    /// `SendComplete` event. Zero if `connection` or `stream` isn't known.
    pub fn in_flight_send_count(&self, connection: RawHandle, stream: RawHandle) -> usize {
        self.connections
            .with(connection, |conn| {
                conn.streams().with(stream, |s| s.in_flight_sends().len()).unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Shuts down every live connection and releases the listener. Safe to call even if `listen`
    /// was never called.
    pub fn shutdown(&self) {
        for (handle, _connection) in self.connections.drain_all() {
            self.backend.shutdown_connection(handle);
        }
        self.tracked_connections
            .lock()
            .expect("tracked connections lock poisoned")
            .clear();
        if let Some(listener) = self.listener.lock().expect("listener lock poisoned").take() {
            self.backend.close_listener(listener);
        }
        self.listening.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ConnectionEvent, MockBackend};
    use crate::callback::Callback;
    use crate::config::{QuicImplType, Role};
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn server_with(backend: Arc<MockBackend>) -> Server {
        Server::new(backend, QuicConfiguration::new(QuicImplType::MsQuic, Role::Server))
    }

    #[test]
    fn listen_twice_fails_with_already_listening() {
        let server = server_with(Arc::new(MockBackend::new()));
        server.listen("h3", 6666).unwrap();
        assert_eq!(server.listen("h3", 6666), Err(QuicErrorCode::AlreadyListening));
    }

    #[test]
    fn accepting_a_connection_runs_on_connected_and_tracks_it() {
        let backend = Arc::new(MockBackend::new());
        let mut server = server_with(backend.clone());
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();
        server.callbacks.on_connected = Some(Callback::new(move |_h| {
            count2.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        server.listen("h3", 6666).unwrap();

        let listener = server.listener.lock().unwrap().unwrap();
        let conn = RawHandle::fresh();
        backend.push_listener_event(listener, conn);
        backend.push_connection_event(conn, ConnectionEvent::Connected);

        server.poll();

        assert_eq!(count.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(server.connection_count(), 1);
    }

    #[test]
    fn shutdown_closes_every_live_connection() {
        let backend = Arc::new(MockBackend::new());
        let server = server_with(backend.clone());
        server.listen("h3", 6666).unwrap();
        let listener = server.listener.lock().unwrap().unwrap();
        let conn = RawHandle::fresh();
        backend.push_listener_event(listener, conn);
        backend.push_connection_event(conn, ConnectionEvent::Connected);
        server.poll();
        assert_eq!(server.connection_count(), 1);

        server.shutdown();

        assert_eq!(server.connection_count(), 0);
        assert!(!server.is_listening());
    }
}
