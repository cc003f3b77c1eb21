// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use crate::error::{QuicErrorCode, Result};

/// Concurrent map from an opaque handle to the state owned for it.
///
/// This is the "arena": the map itself owns every `V` it stores, and callers carry the
/// lightweight `K` around (typically a [`crate::handle::RawHandle`]) instead of a managed
/// reference, which is what lets a [`crate::connection::Stream`] point back at its owning
/// [`crate::connection::Connection`] without a reference cycle.
///
/// All operations take the lock for their entire duration; none of them invoke user code while
/// holding it (callers are expected to do the add/erase, release the lock implicitly by
/// returning, and only then run any callback).
pub struct HandleContextMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for HandleContextMap<K, V>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HandleContextMap<K, V>
where
    K: Eq + Hash + Copy,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `value` under `handle`. Fails with `value_already_exists` if the handle is
    /// already present.
    pub fn add(&self, handle: K, value: V) -> Result<()> {
        let mut map = self.inner.write().expect("handle map lock poisoned");
        if map.contains_key(&handle) {
            return Err(QuicErrorCode::ValueAlreadyExists);
        }
        map.insert(handle, value);
        Ok(())
    }

    /// Removes and returns the value stored for `handle`, so the caller can invoke a
    /// lifecycle callback (`on_disconnected`, `on_stream_close`, ...) on it after the map's lock
    /// has been released. Fails with `value_does_not_exists` if the handle isn't present.
    pub fn erase(&self, handle: K) -> Result<V> {
        let mut map = self.inner.write().expect("handle map lock poisoned");
        map.remove(&handle).ok_or(QuicErrorCode::ValueDoesNotExist)
    }

    /// True if `handle` currently has an entry.
    pub fn contains(&self, handle: K) -> bool {
        self.inner
            .read()
            .expect("handle map lock poisoned")
            .contains_key(&handle)
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("handle map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` with read access to the value stored for `handle`, if any.
    pub fn with<R>(&self, handle: K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.inner
            .read()
            .expect("handle map lock poisoned")
            .get(&handle)
            .map(f)
    }

    /// Runs `f` with write access to the value stored for `handle`, if any.
    ///
    /// Used only for mutating an entry in place (e.g. a stream's receive ring); `f` must not
    /// invoke user code, since the map's write lock is held for its entire duration.
    pub fn with_mut<R>(&self, handle: K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.inner
            .write()
            .expect("handle map lock poisoned")
            .get_mut(&handle)
            .map(f)
    }

    /// Snapshot of every handle currently stored. Used to enumerate a connection's streams (or
    /// a server's connections) for polling without holding the lock across the poll itself.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .read()
            .expect("handle map lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Drains every entry, returning them for the caller to run shutdown callbacks over
    /// (used by a server's shutdown path to tear down every live connection at once).
    pub fn drain_all(&self) -> Vec<(K, V)> {
        self.inner
            .write()
            .expect("handle map lock poisoned")
            .drain()
            .collect()
    }
}
