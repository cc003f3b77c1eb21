// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The top-level entry point: owns the shared backend and hands out [`Server`]s and [`Client`]s.
//!
//! Grounded on the source project's `quic_app` class, which wraps a single registration with the
//! underlying stack and is the factory every listener/connection is built through.

use std::sync::Arc;

use crate::backend::QuicBackend;
use crate::client::Client;
use crate::config::QuicConfiguration;
use crate::server::Server;

/// Owns the shared [`QuicBackend`] a process uses to talk to the underlying QUIC stack.
///
/// Cloning the backend handle (an `Arc`) into every [`Server`]/[`Client`] it creates is what lets
/// several listeners and outbound connections share one registration, matching the source
/// project's one-registration-per-process model.
pub struct Application {
    backend: Arc<dyn QuicBackend>,
}

impl Application {
    pub fn new(backend: Arc<dyn QuicBackend>) -> Self {
        Self { backend }
    }

    /// Builds a [`Server`] bound to this application's backend. `config`'s role should be
    /// [`crate::config::Role::Server`]; [`Server::listen`] will surface a validation failure if
    /// its credentials are missing.
    pub fn make_server(&self, config: QuicConfiguration) -> Server {
        Server::new(self.backend.clone(), config)
    }

    /// Builds a [`Client`] bound to this application's backend. `config`'s role should be
    /// [`crate::config::Role::Client`].
    pub fn make_client(&self, config: QuicConfiguration) -> Client {
        Client::new(self.backend.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::{QuicImplType, Role};

    #[test]
    fn servers_and_clients_share_the_same_backend() {
        let app = Application::new(Arc::new(MockBackend::new()));
        let server = app.make_server(QuicConfiguration::new(QuicImplType::MsQuic, Role::Server));
        let client = app.make_client(QuicConfiguration::new(QuicImplType::MsQuic, Role::Client));
        assert!(!server.is_listening());
        assert!(!client.is_connected());
    }
}
