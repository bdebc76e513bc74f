//! # Link Statistics
//!
//! Counters that form the durable record of degraded link conditions.

use serde::Serialize;

use crate::error::RcLinkError;

/// Link statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames handed to the transceiver successfully
    pub packets_sent: u32,

    /// Frames accepted after validation
    pub packets_received: u32,

    /// Frames inferred missing from sequence gaps
    pub packets_missed: u32,

    /// Frames rejected for checksum mismatch
    pub crc_errors: u32,

    /// Frames rejected for protocol version mismatch
    pub version_mismatches: u32,

    /// Frames rejected for an unknown or unexpected type
    pub type_mismatches: u32,

    /// Frames rejected for a bad declared payload length
    pub malformed_frames: u32,

    /// Times the aircraft switched to failsafe values
    pub failsafe_activations: u32,

    /// Coarse link quality, 0-100 %
    pub link_quality: u8,
}

/// Why a received frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Checksum,
    Version,
    PacketType,
    Malformed,
}

impl RejectionKind {
    /// Map a decode error to its rejection kind; `None` for non-frame errors
    pub fn classify(err: &RcLinkError) -> Option<Self> {
        match err {
            RcLinkError::ChecksumFailure { .. } => Some(RejectionKind::Checksum),
            RcLinkError::VersionMismatch { .. } => Some(RejectionKind::Version),
            RcLinkError::UnknownPacketType(_) | RcLinkError::UnexpectedPacketType { .. } => {
                Some(RejectionKind::PacketType)
            }
            RcLinkError::PayloadLengthOutOfRange { .. } | RcLinkError::PayloadLengthMismatch { .. } => {
                Some(RejectionKind::Malformed)
            }
            _ => None,
        }
    }
}

impl LinkStats {
    /// Count a rejected frame under its kind
    pub fn record_rejection(&mut self, kind: RejectionKind) {
        let counter = match kind {
            RejectionKind::Checksum => &mut self.crc_errors,
            RejectionKind::Version => &mut self.version_mismatches,
            RejectionKind::PacketType => &mut self.type_mismatches,
            RejectionKind::Malformed => &mut self.malformed_frames,
        };
        *counter = counter.saturating_add(1);
    }

    /// Recompute `link_quality` from the sent and missed counters
    pub fn update_link_quality(&mut self) {
        self.link_quality = link_quality(self.packets_sent, self.packets_missed);
    }
}

/// `clamp(100 * (sent - missed) / sent, 0, 100)`, or 0 when nothing was sent
pub fn link_quality(sent: u32, missed: u32) -> u8 {
    if sent == 0 {
        return 0;
    }

    let delivered = u64::from(sent.saturating_sub(missed));
    (delivered * 100 / u64::from(sent)).min(100) as u8
}
