// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::QuicBackend;
use crate::callback::DataCallback;
use crate::error::{QuicErrorCode, Result};
use crate::handle::{RawHandle, SerialNumber};
use crate::handle_map::HandleContextMap;
use crate::ring::{new_receive_ring, RingBuffer};
use crate::send_buffer::{self, SendBuffer};

/// The three callbacks a [`Stream`] may have registered on it.
///
/// `on_data_received` is the only one that must be set for a stream to be useful; `on_start` and
/// `on_close` are optional (a caller that opened the stream itself already knows when it started,
/// and typically only cares about `on_close` for peer-initiated streams).
#[derive(Clone, Default)]
pub struct StreamCallbacks {
    pub on_start: Option<crate::callback::Callback<RawHandle>>,
    pub on_close: Option<crate::callback::Callback<RawHandle>>,
    pub on_data_received: Option<DataCallback>,
}

/// Per-stream state: its handle, a non-owning back-reference to its connection, a serial number,
/// its receive ring, and its callbacks.
///
/// The back-reference to the owning connection is carried as a [`RawHandle`] rather than a
/// managed pointer: resolving it means looking the handle back up in the owning [`Connection`]'s
/// or [`crate::server::Server`]'s map, which is always cheap and never creates a reference cycle.
pub struct Stream {
    handle: RawHandle,
    connection: RawHandle,
    serial: SerialNumber,
    receive_ring: Box<dyn RingBuffer + Send>,
    pub callbacks: StreamCallbacks,
    in_flight_sends: HandleContextMap<u64, SendBuffer>,
    next_send_context: AtomicU64,
}

impl Stream {
    pub fn new(
        handle: RawHandle,
        connection: RawHandle,
        receive_buffer_size: usize,
        callbacks: StreamCallbacks,
    ) -> Self {
        Self {
            handle,
            connection,
            serial: SerialNumber::generate(),
            receive_ring: new_receive_ring(receive_buffer_size),
            callbacks,
            in_flight_sends: HandleContextMap::new(),
            next_send_context: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The owning connection's handle. Non-owning: look it up again in the relevant
    /// [`HandleContextMap`] to reach the actual [`Connection`].
    pub fn connection(&self) -> RawHandle {
        self.connection
    }

    pub fn serial_number(&self) -> SerialNumber {
        self.serial
    }

    pub fn receive_ring_mut(&mut self) -> &mut (dyn RingBuffer + Send) {
        self.receive_ring.as_mut()
    }

    /// `SendBuffer`s submitted on this stream that haven't yet been confirmed by a
    /// SEND_COMPLETE event, keyed by the context token handed to
    /// [`crate::backend::QuicBackend::send`]. Keeping them alive here, rather than dropping them
    /// once `send` returns, is what stops the backing buffer from being freed while the
    /// underlying stack still has a pointer into it.
    pub fn in_flight_sends(&self) -> &HandleContextMap<u64, SendBuffer> {
        &self.in_flight_sends
    }

    /// Allocates the next context token for a send on this stream.
    pub fn next_send_context(&self) -> u64 {
        self.next_send_context.fetch_add(1, Ordering::Relaxed)
    }
}

/// Per-connection state: its handle, serial number, and the map of streams it owns.
///
/// Invariant: every [`Stream`] in `streams` has `stream.connection() == self.handle()`.
pub struct Connection {
    handle: RawHandle,
    serial: SerialNumber,
    streams: HandleContextMap<RawHandle, Stream>,
}

impl Connection {
    pub fn new(handle: RawHandle) -> Self {
        Self {
            handle,
            serial: SerialNumber::generate(),
            streams: HandleContextMap::new(),
        }
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn serial_number(&self) -> SerialNumber {
        self.serial
    }

    pub fn streams(&self) -> &HandleContextMap<RawHandle, Stream> {
        &self.streams
    }

    /// Opens a new stream on this connection through `backend` and registers it.
    pub fn open_stream(
        &self,
        backend: &dyn QuicBackend,
        receive_buffer_size: usize,
        callbacks: StreamCallbacks,
    ) -> Result<RawHandle> {
        let stream_handle = backend.open_stream(self.handle)?;
        backend.start_stream(stream_handle)?;
        let stream = Stream::new(stream_handle, self.handle, receive_buffer_size, callbacks);
        self.streams.add(stream_handle, stream)?;
        Ok(stream_handle)
    }

    /// Builds a length-prefixed message from `payload`, keeps its [`SendBuffer`] alive in the
    /// stream's in-flight map under a fresh context token, and submits it to `backend`.
    ///
    /// Returns the submitted wire size (`encoded_length + 4`) on success, fixing the source
    /// project's bug where it reported a size derived from the backend's own buffer-descriptor
    /// struct instead.
    ///
    /// The in-flight entry is retired by [`crate::dispatcher::dispatch_stream_event`] once the
    /// matching `SendComplete` event arrives.
    pub fn send(&self, backend: &dyn QuicBackend, stream: RawHandle, payload: &[u8]) -> Result<usize> {
        let context = self
            .streams
            .with(stream, |s| s.next_send_context())
            .ok_or(QuicErrorCode::ValueDoesNotExist)?;
        let buffer = send_buffer::build_message(payload);
        let wire = buffer.data_span().to_vec();
        let wire_size = buffer.wire_size();
        self.streams
            .with(stream, |s| s.in_flight_sends().add(context, buffer))
            .ok_or(QuicErrorCode::ValueDoesNotExist)??;
        backend.send(stream, &wire, context)?;
        Ok(wire_size)
    }
}
