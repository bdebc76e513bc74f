//! # Loopback Transceiver
//!
//! In-memory transceiver pair for tests and simulation.
//!
//! Each end owns an outbound queue that is the peer's inbound queue. Clones
//! share the same queues, so a test can keep a handle for fault injection
//! and inspection while a session owns the transceiver.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::transceiver::Transceiver;
use crate::error::{RcLinkError, Result};
use crate::packet::frame::{FrameBytes, FRAME_SIZE};

/// Frames held per direction before the oldest is overwritten
pub const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Channel {
    frames: VecDeque<FrameBytes>,
    drop_next: usize,
    corrupt_next: Option<(usize, u8)>,
}

impl Channel {
    fn push(&mut self, mut frame: FrameBytes) {
        if self.drop_next > 0 {
            self.drop_next -= 1;
            debug!("Loopback dropped frame (seq {})", frame[2]);
            return;
        }

        if let Some((byte, mask)) = self.corrupt_next.take() {
            frame[byte % FRAME_SIZE] ^= mask;
        }

        if self.frames.len() == QUEUE_CAPACITY {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }
}

fn lock(channel: &Mutex<Channel>) -> MutexGuard<'_, Channel> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transceiver
#[derive(Debug, Clone)]
pub struct LoopbackTransceiver {
    outbound: Arc<Mutex<Channel>>,
    inbound: Arc<Mutex<Channel>>,
    transmit_failure: Arc<AtomicBool>,
    powered_down: Arc<AtomicBool>,
}

impl Default for LoopbackTransceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransceiver {
    /// Unpaired transceiver; use [`inject`](Self::inject) and
    /// [`take_sent`](Self::take_sent) to play the other end by hand
    pub fn new() -> Self {
        Self {
            outbound: Arc::default(),
            inbound: Arc::default(),
            transmit_failure: Arc::default(),
            powered_down: Arc::default(),
        }
    }

    /// Two transceivers wired to each other
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_link::radio::{LoopbackTransceiver, Transceiver};
    ///
    /// let (mut ground, mut aircraft) = LoopbackTransceiver::pair();
    /// ground.transmit(&[0u8; 32]).unwrap();
    /// assert!(aircraft.is_data_available().unwrap());
    /// ```
    pub fn pair() -> (Self, Self) {
        let a_to_b: Arc<Mutex<Channel>> = Arc::default();
        let b_to_a: Arc<Mutex<Channel>> = Arc::default();

        let a = Self {
            outbound: Arc::clone(&a_to_b),
            inbound: Arc::clone(&b_to_a),
            transmit_failure: Arc::default(),
            powered_down: Arc::default(),
        };
        let b = Self {
            outbound: b_to_a,
            inbound: a_to_b,
            transmit_failure: Arc::default(),
            powered_down: Arc::default(),
        };

        (a, b)
    }

    /// Silently lose the next `count` transmitted frames
    pub fn drop_next(&self, count: usize) {
        lock(&self.outbound).drop_next = count;
    }

    /// XOR `mask` into byte `byte` of the next transmitted frame
    pub fn corrupt_next(&self, byte: usize, mask: u8) {
        lock(&self.outbound).corrupt_next = Some((byte, mask));
    }

    /// Make `transmit` report a hardware failure until cleared
    pub fn set_transmit_failure(&self, fail: bool) {
        self.transmit_failure.store(fail, Ordering::SeqCst);
    }

    /// Queue a raw frame for this end to receive
    pub fn inject(&self, frame: FrameBytes) {
        lock(&self.inbound).frames.push_back(frame);
    }

    /// Frames waiting to be received by this end
    pub fn pending(&self) -> usize {
        lock(&self.inbound).frames.len()
    }

    /// Drain frames transmitted by this end that no peer has consumed
    pub fn take_sent(&self) -> Vec<FrameBytes> {
        lock(&self.outbound).frames.drain(..).collect()
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down.load(Ordering::SeqCst)
    }
}

impl Transceiver for LoopbackTransceiver {
    fn transmit(&mut self, frame: &FrameBytes) -> Result<()> {
        if self.transmit_failure.load(Ordering::SeqCst) {
            return Err(RcLinkError::Hardware("loopback transmit failure".to_string()));
        }

        lock(&self.outbound).push(*frame);
        Ok(())
    }

    fn is_data_available(&mut self) -> Result<bool> {
        Ok(!lock(&self.inbound).frames.is_empty())
    }

    fn receive(&mut self, out: &mut FrameBytes) -> Result<()> {
        match lock(&self.inbound).frames.pop_front() {
            Some(frame) => {
                *out = frame;
                Ok(())
            }
            None => Err(RcLinkError::NoData),
        }
    }

    fn power_down(&mut self) -> Result<()> {
        self.powered_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}
