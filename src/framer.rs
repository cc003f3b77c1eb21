// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The length-prefixed frame delivery state machine run inside a stream's RECEIVE callback.
//!
//! Generalized over any [`RingBuffer`] implementation the way the trait intends.

use crate::callback::DataCallback;
use crate::ring::RingBuffer;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Ingests `buffers` (as delivered by a single RECEIVE event) into `ring`, draining and
/// delivering every complete frame to `on_data_received` as soon as it becomes available.
///
/// Unlike a simplified sketch that only drains once per event, this drains fully after every
/// sub-buffer is pushed, so a single event carrying several complete frames delivers all of them,
/// and a frame split across many tiny events is delivered the instant its last byte arrives.
pub fn ingest(ring: &mut dyn RingBuffer, buffers: &[&[u8]], on_data_received: &DataCallback) {
    ingest_with(ring, buffers, |bytes| {
        on_data_received.call(bytes);
    });
}

/// Same drain loop as [`ingest`], but collects each frame into an owned `Vec<u8>` instead of
/// invoking a callback inline.
///
/// [`crate::dispatcher::dispatch_stream_event`] uses this form: it runs while the owning stream's
/// entry is locked inside a [`crate::handle_map::HandleContextMap`], and no callback invocation
/// may occur while a Nexus lock is held. Collecting frames here and delivering them to
/// `on_data_received` only after the lock is released satisfies that rule without changing the
/// drain semantics (the `usize` a real `DataCallback` would return is unused either way; see the
/// comment in [`drain`]).
pub fn ingest_collecting(ring: &mut dyn RingBuffer, buffers: &[&[u8]]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    ingest_with(ring, buffers, |bytes| frames.push(bytes.to_vec()));
    frames
}

fn ingest_with(ring: &mut dyn RingBuffer, buffers: &[&[u8]], mut deliver: impl FnMut(&[u8])) {
    for buf in buffers {
        let mut offset = 0;
        while offset < buf.len() {
            let k = ring.empty_space().min(buf.len() - offset);
            if k == 0 {
                // Ring is full and, per drain() below, has no complete frame to hand over, so
                // this event is simply abandoned; an oversize frame and a merely-backed-up
                // consumer both end up here.
                return;
            }
            ring.put(&buf[offset..offset + k]);
            offset += k;
            drain(ring, &mut deliver);
        }
    }
}

fn drain(ring: &mut dyn RingBuffer, deliver: &mut impl FnMut(&[u8])) {
    loop {
        if ring.consumed_space() < LENGTH_PREFIX_SIZE {
            break;
        }

        let mut length_bytes = [0u8; LENGTH_PREFIX_SIZE];
        // `peek` (rather than `available_span`) is used for the length prefix because it is
        // correct even if the prefix itself straddles the ring's physical wrap point on a
        // non-VM ring.
        ring.peek(&mut length_bytes);
        let len = u32::from_le_bytes(length_bytes) as usize;

        if ring.consumed_space() - LENGTH_PREFIX_SIZE < len {
            // Partial frame; wait for more bytes.
            break;
        }

        let span = ring.available_span();
        if span.len() < LENGTH_PREFIX_SIZE + len {
            // The frame is fully buffered but not contiguous (only possible on the Naive/Pow2
            // rings when the data straddles the physical end of the backing storage). The VM
            // ring never hits this because its double mapping keeps every buffered region
            // contiguous, which is why it's the ring `new_receive_ring` hands out by default.
            // Falling back here still has to deliver: copy the frame out through a scratch
            // buffer rather than require a contiguous slice.
            let mut scratch = vec![0u8; LENGTH_PREFIX_SIZE + len];
            ring.peek(&mut scratch);
            deliver(&scratch[LENGTH_PREFIX_SIZE..]);
            ring.mark_as_read(LENGTH_PREFIX_SIZE + len);
            continue;
        }

        deliver(&span[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len]);
        ring.mark_as_read(LENGTH_PREFIX_SIZE + len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{NaiveRing, PageAlignment, VmRing};
    use std::sync::{Arc, Mutex};

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn collecting_callback() -> (DataCallback, Arc<Mutex<Vec<Vec<u8>>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let cb = DataCallback::new(move |bytes: &[u8]| {
            received2.lock().unwrap().push(bytes.to_vec());
            bytes.len()
        });
        (cb, received)
    }

    #[test]
    fn s1_single_frame_single_buffer() {
        let mut ring = VmRing::new(4096, PageAlignment::Auto).unwrap();
        let (cb, received) = collecting_callback();
        let data = frame(b"ABCD");
        ingest(&mut ring, &[&data], &cb);
        assert_eq!(*received.lock().unwrap(), vec![b"ABCD".to_vec()]);
        assert_eq!(ring.consumed_space(), 0);
    }

    #[test]
    fn s2_ten_frames_packed_in_one_buffer() {
        let mut ring = VmRing::new(4096, PageAlignment::Auto).unwrap();
        let (cb, received) = collecting_callback();
        let payloads: Vec<Vec<u8>> = (0..10).map(|i| vec![i as u8; 32]).collect();
        let mut packed = Vec::new();
        for p in &payloads {
            packed.extend(frame(p));
        }
        ingest(&mut ring, &[&packed], &cb);
        assert_eq!(*received.lock().unwrap(), payloads);
        assert_eq!(ring.consumed_space(), 0);
    }

    #[test]
    fn s3_one_byte_per_receive_delivers_exactly_once() {
        let mut ring = VmRing::new(4096, PageAlignment::Auto).unwrap();
        let (cb, received) = collecting_callback();
        let data = frame(&[7u8; 32]);
        for i in 0..data.len() {
            ingest(&mut ring, &[&data[i..i + 1]], &cb);
            if i + 1 < data.len() {
                assert!(received.lock().unwrap().is_empty());
            }
        }
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(received.lock().unwrap()[0], vec![7u8; 32]);
    }

    #[test]
    fn s4_oversize_frame_does_not_panic_or_deliver() {
        let mut ring = VmRing::new(4096, PageAlignment::Auto).unwrap();
        let (cb, received) = collecting_callback();
        let mut data = 5000u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 4000]);
        ingest(&mut ring, &[&data], &cb);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_frame_delivers_an_empty_slice() {
        let mut ring = VmRing::new(4096, PageAlignment::Auto).unwrap();
        let (cb, received) = collecting_callback();
        ingest(&mut ring, &[&frame(&[])], &cb);
        assert_eq!(*received.lock().unwrap(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn works_over_the_naive_ring_when_no_wrap_is_involved() {
        let mut ring = NaiveRing::new(256);
        let (cb, received) = collecting_callback();
        ingest(&mut ring, &[&frame(b"naive")], &cb);
        assert_eq!(*received.lock().unwrap(), vec![b"naive".to_vec()]);
    }

    #[test]
    fn a_frame_straddling_the_physical_wrap_point_is_still_delivered() {
        let mut ring = NaiveRing::new(16);
        // Advance head/tail to 12 so the next 12-byte frame straddles the buffer's physical end
        // (4 bytes before the wrap, 8 bytes after it).
        ring.put(&[0u8; 12]);
        ring.mark_as_read(12);
        assert_eq!(ring.available_span().len(), 4);

        let (cb, received) = collecting_callback();
        let payload = [7u8; 8];
        ingest(&mut ring, &[&frame(&payload)], &cb);
        assert_eq!(*received.lock().unwrap(), vec![payload.to_vec()]);
        assert_eq!(ring.consumed_space(), 0);
    }
}
