//! # Radio Module
//!
//! Transceivers that carry fixed-size frames between the two ends of the link.
//!
//! This module handles:
//! - The transceiver contract consumed by the link session
//! - An in-memory loopback pair with fault injection (tests, simulation)
//! - A serial transceiver for a USB radio bridge
//! - Frame realignment for byte-stream transports

pub mod loopback;
pub mod serial;
pub mod sync;
pub mod transceiver;

pub use loopback::LoopbackTransceiver;
pub use serial::SerialTransceiver;
pub use sync::FrameSync;
pub use transceiver::Transceiver;

#[cfg(test)]
pub use transceiver::MockTransceiver;
