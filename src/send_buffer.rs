// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The owned, self-describing buffer handed from a message builder to [`crate::connection::Connection::send`].

/// Trailing placeholder overwritten with a `{ptr, length}` transport descriptor at send time.
/// Never transmitted on the wire; its only purpose is to let the sender assert it is patching
/// the position it thinks it is.
pub const QUIC_BUF_SENTINEL: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0xBA, 0xAD, 0xC0, 0xDE, 0xCA, 0xFE, 0xBA, 0xBE, 0xDE, 0xAD, 0xFA, 0xCE,
];

const SENTINEL_SIZE: usize = QUIC_BUF_SENTINEL.len();
const LENGTH_PREFIX_SIZE: usize = 4;

/// An owned heap buffer laid out as: `[offset bytes of filler] [4-byte LE length] [payload]
/// [16-byte sentinel]`.
///
/// The 4-byte length prefix and the payload together are exactly what a peer's frame-delivery
/// loop (`crate::framer`) expects to see on the wire; the sentinel never leaves the host.
pub struct SendBuffer {
    buf: Vec<u8>,
    /// Offset of the length prefix within `buf`. Anything before this offset is filler reserved
    /// by the message builder and is not part of the framed payload.
    offset: usize,
}

impl SendBuffer {
    /// Allocates a buffer able to hold `payload_len` bytes plus the length prefix, the sentinel,
    /// and `filler` bytes of builder-reserved space before the length prefix. The length prefix
    /// is written immediately; the payload region is zeroed and left for the caller to fill in.
    pub fn new(filler: usize, payload_len: u32) -> Self {
        let offset = filler;
        let buf_size = offset + LENGTH_PREFIX_SIZE + payload_len as usize + SENTINEL_SIZE;
        let mut buf = vec![0u8; buf_size];
        buf[offset..offset + LENGTH_PREFIX_SIZE].copy_from_slice(&payload_len.to_le_bytes());
        buf[buf_size - SENTINEL_SIZE..].copy_from_slice(&QUIC_BUF_SENTINEL);
        Self { buf, offset }
    }

    /// Builds a [`SendBuffer`] around an already-serialized payload, with no filler.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut sb = Self::new(0, payload.len() as u32);
        sb.payload_mut().copy_from_slice(payload);
        sb
    }

    /// The 4-byte little-endian length read back from the buffer.
    pub fn encoded_data_size(&self) -> u32 {
        let bytes: [u8; 4] = self.buf[self.offset..self.offset + LENGTH_PREFIX_SIZE]
            .try_into()
            .expect("length prefix is always 4 bytes");
        u32::from_le_bytes(bytes)
    }

    /// `[length-prefix][payload]`, i.e. exactly what a peer's framer expects to receive.
    pub fn data_span(&self) -> &[u8] {
        let end = self.buf.len() - SENTINEL_SIZE;
        &self.buf[self.offset..end]
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        let end = self.buf.len() - SENTINEL_SIZE;
        &mut self.buf[self.offset + LENGTH_PREFIX_SIZE..end]
    }

    /// The trailing 16 bytes, read-only. Equal to [`QUIC_BUF_SENTINEL`] until the transport
    /// overwrites it via [`SendBuffer::transport_descriptor_mut`].
    pub fn quic_buffer_span(&self) -> &[u8] {
        let start = self.buf.len() - SENTINEL_SIZE;
        &self.buf[start..]
    }

    /// Mutable access to the trailing 16 bytes, for the transport layer to write the
    /// `{ptr, length}` descriptor into. Panics (mirroring the source project's assertion) if the
    /// sentinel has already been overwritten: a `SendBuffer` may only be sent once.
    pub fn transport_descriptor_mut(&mut self) -> &mut [u8] {
        assert_eq!(
            self.quic_buffer_span(),
            &QUIC_BUF_SENTINEL[..],
            "SendBuffer's transport-descriptor slot was already consumed"
        );
        let start = self.buf.len() - SENTINEL_SIZE;
        &mut self.buf[start..]
    }

    /// `encoded_data_size() + 4`, the number of payload bytes (length prefix included) this
    /// buffer carries. This is the value a send path should report for the submission, fixing the
    /// source project's bug where it returned a size derived from the backend's own
    /// buffer-descriptor struct instead.
    pub fn wire_size(&self) -> usize {
        self.encoded_data_size() as usize + LENGTH_PREFIX_SIZE
    }
}

/// Builds a [`SendBuffer`] from a user-provided closure that fills in the payload bytes.
///
/// Stands in for the source project's FlatBuffers-backed `build_message`, minus the
/// serialization schema itself: the caller is responsible for producing the encoded payload;
/// this helper only takes care of the length prefix and sentinel bookkeeping.
pub fn build_message(payload: &[u8]) -> SendBuffer {
    SendBuffer::from_payload(payload)
}
