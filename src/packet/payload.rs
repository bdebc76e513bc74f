//! # Application Payloads
//!
//! Byte-exact little-endian layouts for the command and telemetry payloads
//! carried inside frames.

use super::frame::MAX_PAYLOAD;
use crate::error::{RcLinkError, Result};

/// Number of RC channels in a command
pub const NUM_CHANNELS: usize = 8;

/// Channel value range (11-bit: 0-2047)
pub const CHANNEL_VALUE_MIN: u16 = 0;
pub const CHANNEL_VALUE_MAX: u16 = 2047;
pub const CHANNEL_VALUE_CENTER: u16 = 1024;

/// Throttle channel index
pub const THROTTLE_CHANNEL: usize = 2;

/// A fixed-size payload with an explicit wire layout
pub trait WirePayload: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Write exactly `SIZE` bytes into `out[..SIZE]`
    fn write_bytes(&self, out: &mut [u8]);

    /// Read from exactly `SIZE` bytes
    fn read_bytes(bytes: &[u8]) -> Self;

    /// Encode into `out`, which must be exactly `SIZE` bytes long
    fn encode(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != Self::SIZE {
            return Err(RcLinkError::InvalidParameter(format!(
                "payload buffer is {} bytes, expected {}",
                out.len(),
                Self::SIZE
            )));
        }
        self.write_bytes(out);
        Ok(())
    }

    /// Decode from `bytes`, which must be exactly `SIZE` bytes long
    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(RcLinkError::PayloadLengthMismatch {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self::read_bytes(bytes))
    }
}

/// RC command sent from the ground station to the aircraft
///
/// Layout (18 bytes): `channels[8]: u16 LE`, `switches: u8`, `mode: u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPayload {
    /// RC channel values, 0-2047
    pub channels: [u16; NUM_CHANNELS],

    /// Eight binary switches, one per bit
    pub switches: u8,

    /// Flight mode
    pub mode: u8,
}

impl CommandPayload {
    /// Safe neutral command: sticks centered, throttle at zero, switches off
    pub fn neutral() -> Self {
        let mut channels = [CHANNEL_VALUE_CENTER; NUM_CHANNELS];
        channels[THROTTLE_CHANNEL] = CHANNEL_VALUE_MIN;

        Self {
            channels,
            switches: 0,
            mode: 0,
        }
    }

    /// State of switch `index` (0-7)
    pub fn switch(&self, index: u8) -> bool {
        index < 8 && (self.switches >> index) & 1 == 1
    }

    /// Set switch `index` (0-7); out-of-range indices are ignored
    pub fn set_switch(&mut self, index: u8, on: bool) {
        if index >= 8 {
            return;
        }
        if on {
            self.switches |= 1 << index;
        } else {
            self.switches &= !(1 << index);
        }
    }
}

impl Default for CommandPayload {
    fn default() -> Self {
        Self::neutral()
    }
}

impl WirePayload for CommandPayload {
    const SIZE: usize = NUM_CHANNELS * 2 + 2;

    fn write_bytes(&self, out: &mut [u8]) {
        for (i, channel) in self.channels.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&channel.to_le_bytes());
        }
        out[16] = self.switches;
        out[17] = self.mode;
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        let mut channels = [0u16; NUM_CHANNELS];
        for (i, channel) in channels.iter_mut().enumerate() {
            *channel = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        }

        Self {
            channels,
            switches: bytes[16],
            mode: bytes[17],
        }
    }
}

/// Telemetry sent from the aircraft to the ground station
///
/// Layout (22 bytes, little-endian):
///
/// | Offset | Field | Type |
/// |--------|-------|------|
/// | 0 | gps_lat (deg × 1e7) | i32 |
/// | 4 | gps_lon (deg × 1e7) | i32 |
/// | 8 | gps_alt (m) | i16 |
/// | 10 | groundspeed (cm/s) | u16 |
/// | 12 | gps_sats | u8 |
/// | 13 | battery_mv | u16 |
/// | 15 | current_ma | u16 |
/// | 17 | heading (deg × 10) | i16 |
/// | 19 | flight_mode | u8 |
/// | 20 | rssi (%) | u8 |
/// | 21 | error_flags | u8 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryPayload {
    pub gps_lat: i32,
    pub gps_lon: i32,
    pub gps_alt: i16,
    pub groundspeed: u16,
    pub gps_sats: u8,
    pub battery_mv: u16,
    pub current_ma: u16,
    pub heading: i16,
    pub flight_mode: u8,
    pub rssi: u8,
    pub error_flags: u8,
}

impl TelemetryPayload {
    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.gps_lat as f64 / 10_000_000.0
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.gps_lon as f64 / 10_000_000.0
    }

    /// Heading in degrees
    pub fn heading_deg(&self) -> f32 {
        self.heading as f32 / 10.0
    }

    /// Battery voltage in volts
    pub fn battery_volts(&self) -> f32 {
        self.battery_mv as f32 / 1000.0
    }
}

impl WirePayload for TelemetryPayload {
    const SIZE: usize = 22;

    fn write_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.gps_lat.to_le_bytes());
        out[4..8].copy_from_slice(&self.gps_lon.to_le_bytes());
        out[8..10].copy_from_slice(&self.gps_alt.to_le_bytes());
        out[10..12].copy_from_slice(&self.groundspeed.to_le_bytes());
        out[12] = self.gps_sats;
        out[13..15].copy_from_slice(&self.battery_mv.to_le_bytes());
        out[15..17].copy_from_slice(&self.current_ma.to_le_bytes());
        out[17..19].copy_from_slice(&self.heading.to_le_bytes());
        out[19] = self.flight_mode;
        out[20] = self.rssi;
        out[21] = self.error_flags;
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        Self {
            gps_lat: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            gps_lon: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            gps_alt: i16::from_le_bytes([bytes[8], bytes[9]]),
            groundspeed: u16::from_le_bytes([bytes[10], bytes[11]]),
            gps_sats: bytes[12],
            battery_mv: u16::from_le_bytes([bytes[13], bytes[14]]),
            current_ma: u16::from_le_bytes([bytes[15], bytes[16]]),
            heading: i16::from_le_bytes([bytes[17], bytes[18]]),
            flight_mode: bytes[19],
            rssi: bytes[20],
            error_flags: bytes[21],
        }
    }
}

const _: () = assert!(CommandPayload::SIZE <= MAX_PAYLOAD);
const _: () = assert!(TelemetryPayload::SIZE <= MAX_PAYLOAD);
