//! # Packet Module
//!
//! Fixed-size framing for the RC link.
//!
//! This module handles:
//! - Wire frame layout (5-byte header, 26-byte payload block, CRC-8)
//! - Frame encoding with zero-filled padding
//! - Frame validation (version, declared length, checksum) and decoding
//! - Command and telemetry payload layouts

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod payload;
