// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque identifier for a connection, stream or listener owned by the underlying QUIC
/// stack.
///
/// Real backends are free to stuff a pointer's bit pattern in here; because it is a plain `u64`
/// rather than a raw pointer, it is `Send + Sync` for free and usable directly as a hash map key,
/// which is what [`crate::handle_map::HandleContextMap`] relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl RawHandle {
    /// Mints a new handle value. Used by backend implementations (including the mock) to produce
    /// fresh, distinct handles.
    pub fn fresh() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

/// A process-unique, monotonically-increasing identifier attached to every [`crate::connection::Connection`]
/// and [`crate::connection::Stream`]. Stable across the object's lifetime and usable to correlate
/// events raised for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(u64);

impl SerialNumber {
    /// Generates the next serial number. Lock-free, process-global.
    pub fn generate() -> Self {
        Self(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_numbers_are_monotonic_and_unique() {
        let a = SerialNumber::generate();
        let b = SerialNumber::generate();
        assert!(b.value() > a.value());
    }

    #[test]
    fn handles_are_distinct() {
        let a = RawHandle::fresh();
        let b = RawHandle::fresh();
        assert_ne!(a, b);
    }
}
