//! # Frame Layout, Constants and Types
//!
//! Core wire definitions for the RC link.
//!
//! ```text
//! ┌─────────┬──────┬──────────┬───────┬─────────────┬──────────────────┬──────────┐
//! │ version │ type │ sequence │ flags │ payload_len │ payload[26]      │ checksum │
//! │ 1 byte  │  1   │    1     │   1   │      1      │ (len valid)      │    1     │
//! └─────────┴──────┴──────────┴───────┴─────────────┴──────────────────┴──────────┘
//! ```
//!
//! The checksum covers the header and `payload[..payload_len]` only.

use std::fmt;
use std::ops::BitOr;

use super::crc::{crc8, crc8_update};
use crate::error::{RcLinkError, Result};

/// Protocol version tag carried by every frame
pub const PROTOCOL_VERSION: u8 = 1;

/// Total frame size on the wire (nRF24L01+ payload limit)
pub const FRAME_SIZE: usize = 32;

/// Header size: version + type + sequence + flags + payload_len
pub const HEADER_SIZE: usize = 5;

/// Checksum size
pub const CHECKSUM_SIZE: usize = 1;

/// Maximum payload capacity of one frame
pub const MAX_PAYLOAD: usize = FRAME_SIZE - HEADER_SIZE - CHECKSUM_SIZE;

/// Byte offset of the payload block
pub const PAYLOAD_OFFSET: usize = HEADER_SIZE;

/// Byte offset of the checksum
pub const CHECKSUM_OFFSET: usize = FRAME_SIZE - CHECKSUM_SIZE;

/// One fixed-size wire unit
pub type FrameBytes = [u8; FRAME_SIZE];

/// Packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Control command (ground → aircraft)
    Command = 0x01,
    /// Telemetry (aircraft → ground)
    Telemetry = 0x02,
    /// Keep-alive
    Heartbeat = 0x03,
    /// Emergency command
    Emergency = 0x04,
}

impl PacketType {
    /// Raw type byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = RcLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(PacketType::Command),
            0x02 => Ok(PacketType::Telemetry),
            0x03 => Ok(PacketType::Heartbeat),
            0x04 => Ok(PacketType::Emergency),
            other => Err(RcLinkError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.as_u8()
    }
}

/// Frame flag bits
///
/// Unrecognized bits are preserved and ignored, never rejected.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// No flags set
    pub const NONE: PacketFlags = PacketFlags(0);

    /// Sender would like an acknowledgement (bit 0)
    pub const ACK_REQUESTED: PacketFlags = PacketFlags(1 << 0);

    /// Emergency condition (bit 1)
    pub const EMERGENCY: PacketFlags = PacketFlags(1 << 1);

    /// Wrap raw flag bits, keeping unknown bits
    pub const fn from_bits(bits: u8) -> Self {
        PacketFlags(bits)
    }

    /// Raw flag bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `true` if every bit of `other` is set
    pub const fn contains(self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PacketFlags {
    type Output = PacketFlags;

    fn bitor(self, rhs: PacketFlags) -> PacketFlags {
        PacketFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketFlags(0b{:08b})", self.0)
    }
}

/// Decoded view of one wire frame
///
/// Fields are kept raw (`packet_type` is a byte, not a [`PacketType`]) so a
/// received frame can be represented before anything in it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub packet_type: u8,
    pub sequence: u8,
    pub flags: PacketFlags,
    pub payload_len: u8,
    pub payload: [u8; MAX_PAYLOAD],
    pub checksum: u8,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            version: 0,
            packet_type: 0,
            sequence: 0,
            flags: PacketFlags::NONE,
            payload_len: 0,
            payload: [0u8; MAX_PAYLOAD],
            checksum: 0,
        }
    }
}

impl Frame {
    /// Parse raw bytes into frame fields without validating them
    pub fn from_bytes(bytes: &FrameBytes) -> Self {
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&bytes[PAYLOAD_OFFSET..CHECKSUM_OFFSET]);

        Self {
            version: bytes[0],
            packet_type: bytes[1],
            sequence: bytes[2],
            flags: PacketFlags::from_bits(bytes[3]),
            payload_len: bytes[4],
            payload,
            checksum: bytes[CHECKSUM_OFFSET],
        }
    }

    /// Serialize into a caller-owned buffer (byte-exact field order)
    pub fn write_to(&self, out: &mut FrameBytes) {
        out[..HEADER_SIZE].copy_from_slice(&self.header_bytes());
        out[PAYLOAD_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&self.payload);
        out[CHECKSUM_OFFSET] = self.checksum;
    }

    /// Serialize into a new buffer
    pub fn to_bytes(&self) -> FrameBytes {
        let mut out = [0u8; FRAME_SIZE];
        self.write_to(&mut out);
        out
    }

    /// Header bytes in wire order
    pub fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        [
            self.version,
            self.packet_type,
            self.sequence,
            self.flags.bits(),
            self.payload_len,
        ]
    }

    /// Interpret the type byte
    ///
    /// # Errors
    ///
    /// Returns `UnknownPacketType` if the byte is outside the enumeration
    pub fn kind(&self) -> Result<PacketType> {
        PacketType::try_from(self.packet_type)
    }

    /// Declared payload prefix, clamped to capacity
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.declared_len()]
    }

    /// Checksum over header and declared payload prefix
    ///
    /// A `payload_len` beyond capacity is clamped, so this never reads out of
    /// bounds; such frames are rejected by validation before it matters.
    pub fn compute_checksum(&self) -> u8 {
        crc8_update(crc8(&self.header_bytes()), self.payload())
    }

    /// `true` for Emergency frames or frames carrying the emergency flag
    pub fn is_emergency(&self) -> bool {
        self.packet_type == PacketType::Emergency.as_u8()
            || self.flags.contains(PacketFlags::EMERGENCY)
    }

    /// Meaningful bytes of this frame: header + declared payload + checksum
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.declared_len() + CHECKSUM_SIZE
    }

    fn declared_len(&self) -> usize {
        (self.payload_len as usize).min(MAX_PAYLOAD)
    }
}
