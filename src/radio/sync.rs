//! # Frame Synchronizer
//!
//! Recovers frame boundaries from a byte stream.
//!
//! A serial link has no framing of its own, so one stray or lost byte would
//! shift every later 32-byte read. The synchronizer buffers incoming bytes and,
//! when the head of the buffer is not a valid frame, slides forward to the next
//! offset that starts with `PROTOCOL_VERSION` and carries a valid checksum.
//!
//! An invalid head followed by a valid frame exactly one frame later is an
//! aligned but corrupted frame. It is delivered as-is so the decoder rejects
//! and counts it. When no valid frame start is buffered at all, the head is
//! delivered unvalidated for the same reason.

use std::io::{self, Read};

use tracing::warn;

use crate::packet::decoder::is_valid;
use crate::packet::frame::{Frame, FrameBytes, FRAME_SIZE, PROTOCOL_VERSION};

/// Bytes buffered at most; older bytes are discarded first
pub const SYNC_CAPACITY: usize = FRAME_SIZE * 8;

/// Byte-stream to frame aligner
#[derive(Debug, Default)]
pub struct FrameSync {
    buf: Vec<u8>,
    resyncs: u32,
    discarded_bytes: u32,
}

impl FrameSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.enforce_capacity();
    }

    /// Read up to `max` bytes from `reader` into the buffer
    ///
    /// Returns the number of bytes read; bytes read before an error are kept.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R, max: usize) -> io::Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + max, 0);

        let result = reader.read(&mut self.buf[start..]);
        let read = *result.as_ref().unwrap_or(&0);
        self.buf.truncate(start + read);
        self.enforce_capacity();

        result
    }

    /// `true` if a whole frame can be taken after alignment
    pub fn has_frame(&mut self) -> bool {
        self.align();
        self.buf.len() >= FRAME_SIZE
    }

    /// Take the next frame, aligning first
    pub fn next_frame(&mut self) -> Option<FrameBytes> {
        if !self.has_frame() {
            return None;
        }

        let mut frame = [0u8; FRAME_SIZE];
        frame.copy_from_slice(&self.buf[..FRAME_SIZE]);
        self.buf.drain(..FRAME_SIZE);
        Some(frame)
    }

    /// Bytes needed before another frame could be complete
    pub fn missing(&self) -> usize {
        FRAME_SIZE.saturating_sub(self.buf.len())
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Times the stream had to be realigned
    pub fn resyncs(&self) -> u32 {
        self.resyncs
    }

    pub fn discarded_bytes(&self) -> u32 {
        self.discarded_bytes
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn align(&mut self) {
        if self.buf.len() < FRAME_SIZE || self.is_frame_at(0) {
            return;
        }

        let last = self.buf.len() - FRAME_SIZE;
        let Some(offset) = (1..=last).find(|&offset| self.is_frame_at(offset)) else {
            return;
        };

        // Aligned corrupted frame, let the decoder see it
        if offset % FRAME_SIZE == 0 {
            return;
        }

        self.discard(offset);
        self.resyncs = self.resyncs.saturating_add(1);
        warn!("Serial stream realigned, skipped {} bytes", offset);
    }

    fn is_frame_at(&self, offset: usize) -> bool {
        if self.buf[offset] != PROTOCOL_VERSION {
            return false;
        }

        match <&FrameBytes>::try_from(&self.buf[offset..offset + FRAME_SIZE]) {
            Ok(bytes) => is_valid(&Frame::from_bytes(bytes)),
            Err(_) => false,
        }
    }

    fn discard(&mut self, count: usize) {
        self.buf.drain(..count);
        self.discarded_bytes = self.discarded_bytes.saturating_add(count as u32);
    }

    fn enforce_capacity(&mut self) {
        if self.buf.len() > SYNC_CAPACITY {
            self.discard(self.buf.len() - SYNC_CAPACITY);
        }
    }
}
