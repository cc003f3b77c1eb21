// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// The full error taxonomy surfaced by every fallible operation in this crate.
///
/// Mirrors the one defined by the underlying transport stack so that error codes survive
/// round-tripping through logs and diagnostics unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuicErrorCode {
    Success,
    MissingCertificate,
    MissingPrivateKey,
    ConfigurationLoadCredentialFailed,
    Uninitialized,
    AlreadyInitialized,
    AlreadyListening,
    ApiInitializationFailed,
    RegistrationInitializationFailed,
    ConfigurationInitializationFailed,
    ListenerInitializationFailed,
    ListenerStartFailed,
    StreamOpenFailed,
    StreamStartFailed,
    ConnectionInitializationFailed,
    ConnectionStartFailed,
    ClientNotConnected,
    ClientAlreadyConnected,
    SendFailed,
    NotYetImplemented,
    ValueAlreadyExists,
    ValueEmplaceFailed,
    ValueDoesNotExist,
    MemoryAllocationFailed,
    NoSuchImplementation,
}

impl QuicErrorCode {
    /// True for `Success`, false for every failure variant.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Opposite of [`QuicErrorCode::is_success`].
    pub fn is_failure(self) -> bool {
        !self.is_success()
    }

    fn message(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::MissingCertificate => "missing certificate file",
            Self::MissingPrivateKey => "missing private key file",
            Self::ConfigurationLoadCredentialFailed => "failed to load TLS credentials",
            Self::Uninitialized => "object used before initialization",
            Self::AlreadyInitialized => "object already initialized",
            Self::AlreadyListening => "server is already listening",
            Self::ApiInitializationFailed => "failed to initialize the underlying QUIC API",
            Self::RegistrationInitializationFailed => "failed to open QUIC registration",
            Self::ConfigurationInitializationFailed => "failed to open QUIC configuration",
            Self::ListenerInitializationFailed => "failed to open listener",
            Self::ListenerStartFailed => "failed to start listener",
            Self::StreamOpenFailed => "failed to open stream",
            Self::StreamStartFailed => "failed to start stream",
            Self::ConnectionInitializationFailed => "failed to open connection",
            Self::ConnectionStartFailed => "failed to start connection",
            Self::ClientNotConnected => "client has no active connection",
            Self::ClientAlreadyConnected => "client already has an active connection",
            Self::SendFailed => "failed to submit send buffer",
            Self::NotYetImplemented => "not yet implemented",
            Self::ValueAlreadyExists => "value already exists for this handle",
            Self::ValueEmplaceFailed => "failed to emplace value for this handle",
            Self::ValueDoesNotExist => "no value exists for this handle",
            Self::MemoryAllocationFailed => "memory allocation failed",
            Self::NoSuchImplementation => "no such QUIC implementation",
        }
    }
}

impl fmt::Display for QuicErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for QuicErrorCode {}

/// Convenience alias used throughout the public API.
pub type Result<T> = std::result::Result<T, QuicErrorCode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_the_only_successful_variant() {
        assert!(QuicErrorCode::Success.is_success());
        assert!(QuicErrorCode::SendFailed.is_failure());
    }

    #[test]
    fn every_variant_has_nonempty_display_text() {
        let variants = [
            QuicErrorCode::Success,
            QuicErrorCode::MissingCertificate,
            QuicErrorCode::MissingPrivateKey,
            QuicErrorCode::ConfigurationLoadCredentialFailed,
            QuicErrorCode::Uninitialized,
            QuicErrorCode::AlreadyInitialized,
            QuicErrorCode::AlreadyListening,
            QuicErrorCode::ApiInitializationFailed,
            QuicErrorCode::RegistrationInitializationFailed,
            QuicErrorCode::ConfigurationInitializationFailed,
            QuicErrorCode::ListenerInitializationFailed,
            QuicErrorCode::ListenerStartFailed,
            QuicErrorCode::StreamOpenFailed,
            QuicErrorCode::StreamStartFailed,
            QuicErrorCode::ConnectionInitializationFailed,
            QuicErrorCode::ConnectionStartFailed,
            QuicErrorCode::ClientNotConnected,
            QuicErrorCode::ClientAlreadyConnected,
            QuicErrorCode::SendFailed,
            QuicErrorCode::NotYetImplemented,
            QuicErrorCode::ValueAlreadyExists,
            QuicErrorCode::ValueEmplaceFailed,
            QuicErrorCode::ValueDoesNotExist,
            QuicErrorCode::MemoryAllocationFailed,
            QuicErrorCode::NoSuchImplementation,
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
