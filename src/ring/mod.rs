// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Single-producer/single-consumer byte ring buffers.
//!
//! Three interchangeable implementations share the [`RingBuffer`] trait: [`naive::NaiveRing`]
//! (arbitrary size, split-copy at the wrap point), [`pow2::Pow2Ring`] (power-of-two size, masked
//! indices) and [`vm::VmRing`] (page-aligned size, double-mapped virtual memory so that reads and
//! writes never split). [`crate::framer`]'s drain loop is generic over any of them.

pub mod naive;
pub mod pow2;
pub mod vm;

pub use naive::NaiveRing;
pub use pow2::Pow2Ring;
pub use vm::{PageAlignment, VmRing};

/// Builds the fastest ring buffer available for a stream's receive window: a [`VmRing`] if the
/// platform's double-mapping trick succeeds, falling back to a [`Pow2Ring`] of the nearest
/// power-of-two capacity otherwise. This degradation is a throughput concession, not a
/// correctness one: every `RingBuffer` implementation obeys the same contract.
pub fn new_receive_ring(requested_size: usize) -> Box<dyn RingBuffer + Send> {
    match VmRing::new(requested_size, PageAlignment::Auto) {
        Ok(ring) => Box::new(ring),
        Err(e) => {
            log::warn!(
                "VM ring buffer unavailable ({e}), falling back to the pow2 ring buffer for a {requested_size}-byte receive window"
            );
            Box::new(Pow2Ring::new(pow2::next_pow2(requested_size + 1)))
        }
    }
}

/// Common contract implemented by every ring buffer variant.
///
/// All three implementations agree on this semantics: `head` advances on read, `tail` advances
/// on write, and `consumed_space() + empty_space()` equals the ring's effective capacity at every
/// quiescent point.
pub trait RingBuffer {
    /// Copies `src` into the ring. Returns `false` without copying anything if there isn't enough
    /// room.
    fn put(&mut self, src: &[u8]) -> bool;

    /// Copies the next `dst.len()` unread bytes into `dst` without consuming them. Returns
    /// `false` without copying anything if there aren't enough unread bytes.
    fn peek(&self, dst: &mut [u8]) -> bool;

    /// Like [`RingBuffer::peek`] followed by [`RingBuffer::mark_as_read`] with `dst.len()`.
    fn get(&mut self, dst: &mut [u8]) -> bool {
        if !self.peek(dst) {
            return false;
        }
        self.mark_as_read(dst.len());
        true
    }

    /// Advances the read cursor by `amount` bytes, which must be `<= consumed_space()`.
    fn mark_as_read(&mut self, amount: usize);

    /// Advances the write cursor by `amount` bytes, which must be `<= empty_space()`.
    ///
    /// Exposed for symmetry with the source project; ordinary producers should use [`RingBuffer::put`]
    /// instead, which performs the copy and the cursor advance together.
    fn mark_as_write(&mut self, amount: usize);

    /// Number of unread bytes currently buffered.
    fn consumed_space(&self) -> usize;

    /// Number of bytes that can still be [`RingBuffer::put`] without overflowing.
    fn empty_space(&self) -> usize;

    /// The ring's total backing capacity. For [`pow2::Pow2Ring`] the *effective* capacity
    /// (`consumed_space() + empty_space()`) is one less than this.
    fn total_size(&self) -> usize;

    /// Drops all buffered bytes without reading them.
    fn clear(&mut self);

    /// A single contiguous slice over the currently unread bytes.
    ///
    /// For [`vm::VmRing`] this always covers the full `consumed_space()`, even across the wrap
    /// point, which is the entire reason the VM variant exists. For [`naive::NaiveRing`] and
    /// [`pow2::Pow2Ring`] the slice stops at the physical end of the backing storage if the
    /// unread region wraps.
    fn available_span(&self) -> &[u8];
}
