// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use nexus::backend::{ConnectionEvent, MockBackend, StreamEvent};
use nexus::callback::DataCallback;
use nexus::config::{QuicConfiguration, QuicImplType, Role};
use nexus::connection::StreamCallbacks;
use nexus::{Application, Callback, QuicErrorCode, RawHandle};

fn server_config() -> QuicConfiguration {
    QuicConfiguration::new(QuicImplType::MsQuic, Role::Server)
}

fn client_config() -> QuicConfiguration {
    QuicConfiguration::new(QuicImplType::MsQuic, Role::Client)
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

#[test]
fn server_accepts_a_connection_and_rejects_a_peer_initiated_stream() {
    let backend = Arc::new(MockBackend::new());
    let app = Application::new(backend.clone());
    let server = app.make_server(server_config());
    server.listen("nexus-test", 6001).unwrap();
    let listener = server.listener_handle().unwrap();

    let connection = RawHandle::fresh();
    backend.push_listener_event(listener, connection);
    backend.push_connection_event(connection, ConnectionEvent::Connected);
    server.poll();
    assert_eq!(server.connection_count(), 1);

    let peer_stream = RawHandle::fresh();
    backend.push_connection_event(connection, ConnectionEvent::PeerStreamStarted { stream: peer_stream });
    server.poll();
    assert!(!server.has_stream(connection, peer_stream));
}

#[test]
fn client_accepts_a_peer_initiated_stream_and_receives_framed_data() {
    let backend = Arc::new(MockBackend::new());
    let app = Application::new(backend.clone());
    let mut client = app.make_client(client_config());

    let received = Arc::new(Mutex::new(Vec::new()));
    let received2 = received.clone();
    let started = Arc::new(AtomicU32::new(0));
    let started2 = started.clone();
    client.callbacks.on_stream_start = Some(Callback::new(move |_h| {
        started2.fetch_add(1, Ordering::SeqCst);
    }));
    client.callbacks.on_data_received = Some(DataCallback::new(move |bytes| {
        received2.lock().unwrap().push(bytes.to_vec());
        bytes.len()
    }));

    client.connect("localhost", 6002).unwrap();
    let connection = client.connection_handle().unwrap();
    backend.push_connection_event(connection, ConnectionEvent::Connected);
    client.poll();
    assert!(client.is_connected());

    let peer_stream = RawHandle::fresh();
    backend.push_connection_event(connection, ConnectionEvent::PeerStreamStarted { stream: peer_stream });
    client.poll();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(client.has_stream(peer_stream));

    backend.push_stream_event(peer_stream, StreamEvent::Receive { buffers: vec![frame(b"hello")] });
    client.poll();
    assert_eq!(*received.lock().unwrap(), vec![b"hello".to_vec()]);
}

#[test]
fn send_lifecycle_retires_the_in_flight_buffer_once_the_backend_confirms_it() {
    let backend = Arc::new(MockBackend::new());
    let app = Application::new(backend.clone());
    let client = app.make_client(client_config());
    client.connect("localhost", 6003).unwrap();
    let connection = client.connection_handle().unwrap();
    backend.push_connection_event(connection, ConnectionEvent::Connected);
    client.poll();

    let stream = client.open_stream(StreamCallbacks::default()).unwrap();
    let wire_size = client.send(stream, b"payload").unwrap();
    assert_eq!(wire_size, "payload".len() + 4);
    assert_eq!(client.in_flight_send_count(stream), 1);

    // MockBackend::send already queued the matching SendComplete event synchronously.
    client.poll();
    assert_eq!(client.in_flight_send_count(stream), 0);
}

#[test]
fn disconnect_without_a_connection_fails() {
    let backend = Arc::new(MockBackend::new());
    let app = Application::new(backend);
    let client = app.make_client(client_config());
    assert_eq!(client.disconnect(), Err(QuicErrorCode::ClientNotConnected));
}

#[test]
fn server_shutdown_tears_down_every_live_connection_and_listener() {
    let backend = Arc::new(MockBackend::new());
    let app = Application::new(backend.clone());
    let server = app.make_server(server_config());
    server.listen("nexus-test", 6004).unwrap();
    let listener = server.listener_handle().unwrap();
    let connection = RawHandle::fresh();
    backend.push_listener_event(listener, connection);
    backend.push_connection_event(connection, ConnectionEvent::Connected);
    server.poll();
    assert_eq!(server.connection_count(), 1);

    server.shutdown();

    assert_eq!(server.connection_count(), 0);
    assert!(!server.is_listening());
    assert_eq!(server.listen("nexus-test", 6004), Ok(()));
}
