// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use super::RingBuffer;

/// Split-copy SPSC ring buffer. Accepts any total size; `put`/`peek` may each require two
/// `memcpy`s when the requested range straddles the end of the backing storage.
pub struct NaiveRing {
    buf: Vec<u8>,
    total_size: usize,
    head: usize,
    tail: usize,
    consumed: usize,
    /// Present for parity with the source project's constructor signature. Not exercised by any
    /// operation here; the source never exercises it either.
    #[allow(dead_code)]
    allow_overwrite: bool,
}

impl NaiveRing {
    pub fn new(total_size: usize) -> Self {
        Self::with_overwrite(total_size, false)
    }

    pub fn with_overwrite(total_size: usize, allow_overwrite: bool) -> Self {
        assert!(total_size > 0, "ring size must be non-zero");
        Self {
            buf: vec![0u8; total_size],
            total_size,
            head: 0,
            tail: 0,
            consumed: 0,
            allow_overwrite,
        }
    }
}

impl RingBuffer for NaiveRing {
    fn put(&mut self, src: &[u8]) -> bool {
        if self.empty_space() < src.len() {
            return false;
        }
        let first = src.len().min(self.total_size - self.tail);
        self.buf[self.tail..self.tail + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        if rest > 0 {
            self.buf[..rest].copy_from_slice(&src[first..]);
        }
        self.mark_as_write(src.len());
        true
    }

    fn peek(&self, dst: &mut [u8]) -> bool {
        if self.consumed_space() < dst.len() {
            return false;
        }
        let first = dst.len().min(self.total_size - self.head);
        dst[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        let rest = dst.len() - first;
        if rest > 0 {
            dst[first..].copy_from_slice(&self.buf[..rest]);
        }
        true
    }

    fn mark_as_read(&mut self, amount: usize) {
        debug_assert!(amount <= self.consumed);
        self.head = (self.head + amount) % self.total_size;
        self.consumed -= amount;
    }

    fn mark_as_write(&mut self, amount: usize) {
        debug_assert!(amount <= self.total_size - self.consumed);
        self.tail = (self.tail + amount) % self.total_size;
        self.consumed += amount;
    }

    fn consumed_space(&self) -> usize {
        self.consumed
    }

    fn empty_space(&self) -> usize {
        self.total_size - self.consumed
    }

    fn total_size(&self) -> usize {
        self.total_size
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.consumed = 0;
    }

    fn available_span(&self) -> &[u8] {
        let contiguous = self.consumed.min(self.total_size - self.head);
        &self.buf[self.head..self.head + contiguous]
    }
}
