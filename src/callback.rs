// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The `Callback<Sig>` primitive.
//!
//! The source project represents a registered callback as a `(function pointer, opaque context)`
//! pair so it can be stored and invoked without generics leaking through the public API. In Rust
//! that shape is unnecessary: a boxed trait object already bundles code and captured state behind
//! a thin pointer, so [`Callback`] is simply `Arc<dyn Fn(...) + Send + Sync>` with a name that
//! matches the concept it stands in for. Cloning a [`Callback`] shares the same underlying
//! closure, which is what lets the dispatcher hold one registered callback per live object
//! without re-registration.

use std::sync::Arc;

/// A thread-safe, reusable callback taking an owned argument of type `T` and returning nothing.
/// Used for `on_connected`, `on_disconnected`, `on_stream_start` and `on_stream_close`, each of
/// which hands the callback a value it owns (a [`crate::connection::Connection`] snapshot or a
/// [`crate::connection::Stream`] handle) rather than a borrow tied to the event's lifetime.
pub struct Callback<T> {
    f: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<T> Callback<T> {
    pub fn new(f: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub fn call(&self, arg: T) {
        (self.f)(arg)
    }
}

/// The `on_data_received(bytes) -> consumed_count` callback. Kept as its own
/// non-generic type (rather than an instantiation of [`Callback`]) because the argument is a
/// borrowed slice whose lifetime is scoped to a single [`crate::framer::ingest`] delivery,
/// which needs a higher-ranked trait bound that a generic `Callback<&[u8]>` can't express.
pub struct DataCallback {
    f: Arc<dyn Fn(&[u8]) -> usize + Send + Sync>,
}

impl Clone for DataCallback {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl DataCallback {
    pub fn new(f: impl Fn(&[u8]) -> usize + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub fn call(&self, bytes: &[u8]) -> usize {
        (self.f)(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn callback_invokes_the_closure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let cb = Callback::new(move |n: u32| {
            calls2.fetch_add(n, Ordering::SeqCst);
        });
        cb.call(5);
        cb.clone().call(2);
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn data_callback_reports_consumed_bytes() {
        let cb = DataCallback::new(|bytes: &[u8]| bytes.len());
        assert_eq!(cb.call(b"abc"), 3);
    }
}
