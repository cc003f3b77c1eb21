// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use super::RingBuffer;

/// Masked-index SPSC ring buffer. `total_size` is forced to a power of two so that index
/// wrapping is a bitwise AND instead of a modulo. One slot is reserved to tell "empty" apart
/// from "full", so the effective capacity is `total_size - 1`.
///
/// Head advances on read and tail advances on write, same as [`super::naive::NaiveRing`] and
/// [`super::vm::VmRing`]. The source project has these swapped for this particular variant,
/// which this port treats as a bug and fixes.
pub struct Pow2Ring {
    buf: Vec<u8>,
    mask: usize,
    head: usize,
    tail: usize,
}

/// Rounds `n` up to the next power of two. Used to translate a desired effective capacity into
/// the `total_size` this ring needs (`next_pow2(capacity + 1)`).
pub fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    n.next_power_of_two()
}

impl Pow2Ring {
    /// `total_size` must already be a power of two; panics otherwise.
    pub fn new(total_size: usize) -> Self {
        assert!(
            total_size.is_power_of_two(),
            "Pow2Ring size must be a power of two, got {total_size}"
        );
        Self {
            buf: vec![0u8; total_size],
            mask: total_size - 1,
            head: 0,
            tail: 0,
        }
    }

    fn total(&self) -> usize {
        self.mask + 1
    }
}

impl RingBuffer for Pow2Ring {
    fn put(&mut self, src: &[u8]) -> bool {
        if self.empty_space() < src.len() {
            return false;
        }
        let mut written = 0;
        while written < src.len() {
            let idx = (self.tail + written) & self.mask;
            let to_end = self.total() - idx;
            let chunk = (src.len() - written).min(to_end);
            self.buf[idx..idx + chunk].copy_from_slice(&src[written..written + chunk]);
            written += chunk;
        }
        self.mark_as_write(src.len());
        true
    }

    fn peek(&self, dst: &mut [u8]) -> bool {
        if self.consumed_space() < dst.len() {
            return false;
        }
        let mut read = 0;
        while read < dst.len() {
            let idx = (self.head + read) & self.mask;
            let to_end = self.total() - idx;
            let chunk = (dst.len() - read).min(to_end);
            dst[read..read + chunk].copy_from_slice(&self.buf[idx..idx + chunk]);
            read += chunk;
        }
        true
    }

    fn mark_as_read(&mut self, amount: usize) {
        debug_assert!(amount <= self.consumed_space());
        self.head = (self.head + amount) & self.mask;
    }

    fn mark_as_write(&mut self, amount: usize) {
        debug_assert!(amount <= self.empty_space());
        self.tail = (self.tail + amount) & self.mask;
    }

    fn consumed_space(&self) -> usize {
        (self.tail.wrapping_sub(self.head)) & self.mask
    }

    fn empty_space(&self) -> usize {
        self.total() - 1 - self.consumed_space()
    }

    fn total_size(&self) -> usize {
        self.total()
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    fn available_span(&self) -> &[u8] {
        let contiguous = self.consumed_space().min(self.total() - self.head);
        &self.buf[self.head..self.head + contiguous]
    }
}
