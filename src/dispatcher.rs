// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Translates [`QuicBackend`] events into Nexus state transitions and user callbacks.
//!
//! Grounded on the underlying stack's own connection/stream callback switches: a server's
//! connection callback registers on CONNECTED and rejects PEER_STREAM_STARTED outright, while a
//! client's accepts it; both share the same stream callback (RECEIVE feeds the framer,
//! SEND_COMPLETE retires an in-flight `SendBuffer`, SHUTDOWN_COMPLETE tears the stream down).
//! [`dispatch_connection_event`] takes an `accept_peer_streams` flag to express that one
//! difference rather than duplicating the rest of the switch for [`crate::server::Server`] and
//! [`crate::client::Client`].
//!
//! The locking discipline ("no callback invocation occurs while any Nexus lock is held") is
//! load-bearing here: every match arm finishes its [`HandleContextMap`] operation, lets the
//! borrow/lock end, and only then calls a user callback.

use log::warn;

use crate::backend::{ConnectionEvent, QuicBackend, StreamEvent};
use crate::callback::{Callback, DataCallback};
use crate::connection::{Connection, Stream, StreamCallbacks};
use crate::framer;
use crate::handle::RawHandle;
use crate::handle_map::HandleContextMap;

/// The five user callbacks a [`crate::server::Server`] or [`crate::client::Client`] may register,
/// gathered in one place the way the underlying stack keeps a single callback table per
/// connection/stream pair.
#[derive(Clone, Default)]
pub struct CallbackTable {
    pub on_connected: Option<Callback<RawHandle>>,
    pub on_disconnected: Option<Callback<RawHandle>>,
    pub on_stream_start: Option<Callback<RawHandle>>,
    pub on_stream_close: Option<Callback<RawHandle>>,
    pub on_data_received: Option<DataCallback>,
}

impl CallbackTable {
    fn stream_callbacks(&self) -> StreamCallbacks {
        StreamCallbacks {
            on_start: self.on_stream_start.clone(),
            on_close: self.on_stream_close.clone(),
            on_data_received: self.on_data_received.clone(),
        }
    }
}

/// Handles one connection-level event.
///
/// `accept_peer_streams` is `false` for a [`crate::server::Server`] (a server only ever talks to
/// streams it didn't open when a misbehaving or legacy peer opens one, and the contract is to
/// reject it immediately) and `true` for a [`crate::client::Client`].
pub fn dispatch_connection_event(
    backend: &dyn QuicBackend,
    connections: &HandleContextMap<RawHandle, Connection>,
    callbacks: &CallbackTable,
    connection_handle: RawHandle,
    event: ConnectionEvent,
    accept_peer_streams: bool,
    stream_receive_buffer_size: usize,
) {
    match event {
        ConnectionEvent::Connected => {
            match connections.add(connection_handle, Connection::new(connection_handle)) {
                Ok(()) => {
                    if let Some(cb) = &callbacks.on_connected {
                        cb.call(connection_handle);
                    }
                }
                Err(e) => warn!("dropping duplicate CONNECTED for {connection_handle:?}: {e}"),
            }
        }
        ConnectionEvent::ShutdownComplete { app_close_in_progress } => {
            match connections.erase(connection_handle) {
                Ok(_connection) => {
                    if let Some(cb) = &callbacks.on_disconnected {
                        cb.call(connection_handle);
                    }
                    if !app_close_in_progress {
                        backend.close_connection(connection_handle);
                    }
                }
                Err(e) => {
                    warn!("SHUTDOWN_COMPLETE for unknown connection {connection_handle:?}: {e}")
                }
            }
        }
        ConnectionEvent::PeerStreamStarted { stream } => {
            if !accept_peer_streams {
                backend.close_stream(stream);
                return;
            }
            let added = connections.with(connection_handle, |conn| {
                let s = Stream::new(
                    stream,
                    connection_handle,
                    stream_receive_buffer_size,
                    callbacks.stream_callbacks(),
                );
                conn.streams().add(stream, s)
            });
            match added {
                Some(Ok(())) => {
                    if let Some(cb) = &callbacks.on_stream_start {
                        cb.call(stream);
                    }
                }
                Some(Err(e)) => warn!("PEER_STREAM_STARTED reused handle {stream:?}: {e}"),
                None => {
                    warn!("PEER_STREAM_STARTED for unknown connection {connection_handle:?}");
                    backend.close_stream(stream);
                }
            }
        }
    }
}

/// Handles one stream-level event for a stream owned by `connection`.
pub fn dispatch_stream_event(
    backend: &dyn QuicBackend,
    connection: &Connection,
    stream_handle: RawHandle,
    event: StreamEvent,
) {
    match event {
        StreamEvent::Receive { buffers } => {
            let refs: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();
            let frames = connection
                .streams()
                .with_mut(stream_handle, |stream| {
                    framer::ingest_collecting(stream.receive_ring_mut(), &refs)
                });
            let Some(frames) = frames else {
                warn!("RECEIVE for unknown stream {stream_handle:?}");
                return;
            };
            if frames.is_empty() {
                return;
            }
            let callback = connection
                .streams()
                .with(stream_handle, |stream| stream.callbacks.on_data_received.clone())
                .flatten();
            if let Some(cb) = callback {
                for frame in &frames {
                    cb.call(frame);
                }
            }
        }
        StreamEvent::SendComplete { context } => {
            let erased = connection
                .streams()
                .with(stream_handle, |stream| stream.in_flight_sends().erase(context));
            match erased {
                Some(Ok(_send_buffer)) => {}
                Some(Err(e)) => warn!("SEND_COMPLETE for unknown context {context}: {e}"),
                None => warn!("SEND_COMPLETE for unknown stream {stream_handle:?}"),
            }
        }
        StreamEvent::ShutdownComplete { app_close_in_progress } => {
            match connection.streams().erase(stream_handle) {
                Ok(stream) => {
                    if let Some(cb) = &stream.callbacks.on_close {
                        cb.call(stream_handle);
                    }
                    if !app_close_in_progress {
                        backend.close_stream(stream_handle);
                    }
                }
                Err(e) => warn!("SHUTDOWN_COMPLETE for unknown stream {stream_handle:?}: {e}"),
            }
        }
    }
}
