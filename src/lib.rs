//! # RC Link
//!
//! Point-to-point radio link protocol between an RC ground station and an aircraft.
//!
//! This library provides fixed-size checksummed frames, sequence-based link
//! loss detection, link statistics and aircraft-side failsafe substitution on
//! top of any transceiver that moves whole frames.

pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod packet;
pub mod radio;
pub mod telemetry;
