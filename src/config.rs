// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{QuicErrorCode, Result};

/// Which underlying QUIC implementation an [`crate::application::Application`] binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuicImplType {
    MsQuic,
}

/// Whether a configuration is for a listening server or an outbound client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// TLS credential paths. Required for the server role; optional for the client role, which falls
/// back to disabling certificate validation when omitted.
#[derive(Debug, Clone, Default)]
pub struct QuicCredentials {
    pub certificate_path: Option<PathBuf>,
    pub private_key_path: Option<PathBuf>,
}

/// Implementation-agnostic configuration values for a QUIC [`crate::application::Application`].
#[derive(Debug, Clone)]
pub struct QuicConfiguration {
    impl_type: QuicImplType,
    role: Role,

    pub alpn: String,
    pub appname: String,
    pub idle_timeout: Option<Duration>,
    pub keep_alive_interval: Option<Duration>,
    pub credentials: QuicCredentials,
    pub stream_receive_window: u32,
    pub stream_receive_buffer: u32,
    pub udp_port_number: u16,
}

impl QuicConfiguration {
    pub fn new(impl_type: QuicImplType, role: Role) -> Self {
        Self {
            impl_type,
            role,
            alpn: "test".to_string(),
            appname: "test".to_string(),
            idle_timeout: None,
            keep_alive_interval: None,
            credentials: QuicCredentials::default(),
            stream_receive_window: 8192,
            stream_receive_buffer: 4096,
            udp_port_number: 6666,
        }
    }

    pub fn impl_type(&self) -> QuicImplType {
        self.impl_type
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Validates the configuration against its role. The server role requires both credential
    /// paths to point at files that exist on disk; the client role has no such requirement (it
    /// may run with certificate validation disabled).
    pub fn validate(&self) -> Result<()> {
        if self.role != Role::Server {
            return Ok(());
        }
        let cert = self
            .credentials
            .certificate_path
            .as_ref()
            .ok_or(QuicErrorCode::MissingCertificate)?;
        if !cert.exists() {
            return Err(QuicErrorCode::MissingCertificate);
        }
        let key = self
            .credentials
            .private_key_path
            .as_ref()
            .ok_or(QuicErrorCode::MissingPrivateKey)?;
        if !key.exists() {
            return Err(QuicErrorCode::MissingPrivateKey);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_configuration_needs_no_credentials() {
        let cfg = QuicConfiguration::new(QuicImplType::MsQuic, Role::Client);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn server_configuration_requires_existing_certificate_and_key() {
        let mut cfg = QuicConfiguration::new(QuicImplType::MsQuic, Role::Server);
        assert_eq!(cfg.validate(), Err(QuicErrorCode::MissingCertificate));

        cfg.credentials.certificate_path = Some(PathBuf::from("/dev/null"));
        assert_eq!(cfg.validate(), Err(QuicErrorCode::MissingPrivateKey));

        cfg.credentials.private_key_path = Some(PathBuf::from("/dev/null"));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = QuicConfiguration::new(QuicImplType::MsQuic, Role::Client);
        assert_eq!(cfg.alpn, "test");
        assert_eq!(cfg.appname, "test");
        assert_eq!(cfg.idle_timeout, None);
        assert_eq!(cfg.stream_receive_window, 8192);
        assert_eq!(cfg.stream_receive_buffer, 4096);
        assert_eq!(cfg.udp_port_number, 6666);
    }
}
