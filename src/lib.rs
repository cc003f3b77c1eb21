// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An ergonomic QUIC transport facade over a pluggable underlying QUIC stack.
//!
//! An [`application::Application`] owns a shared [`backend::QuicBackend`] and hands out
//! [`server::Server`]s and [`client::Client`]s built on it. Each live connection owns a map of
//! [`connection::Stream`]s; each stream pulls inbound bytes through a [`ring`] buffer and a
//! [`framer`] that turns a length-prefixed byte stream back into discrete frames for a
//! user-supplied callback. [`dispatcher`] is the glue between backend events and that state.
//!
//! Implementing the QUIC protocol itself is out of scope; [`backend::MockBackend`] is the
//! in-memory stand-in the test suite drives the rest of the crate against.

pub mod application;
pub mod backend;
pub mod callback;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod framer;
pub mod handle;
pub mod handle_map;
pub mod ring;
pub mod send_buffer;
pub mod server;

pub use application::Application;
pub use backend::{ConnectionEvent, QuicBackend, StreamEvent};
pub use callback::{Callback, DataCallback};
pub use client::Client;
pub use config::{QuicConfiguration, QuicCredentials, QuicImplType, Role};
pub use connection::{Connection, Stream, StreamCallbacks};
pub use error::{QuicErrorCode, Result};
pub use handle::{RawHandle, SerialNumber};
pub use ring::RingBuffer;
