//! # Frame Decoder
//!
//! Validates received frames and extracts their payloads.
//!
//! Nothing in a frame is trusted until [`validate_frame`] passes. Version and
//! declared length are checked before the checksum is recomputed, so a garbage
//! `payload_len` never steers the checksum range.

use super::frame::*;
use super::payload::WirePayload;
use crate::error::{RcLinkError, Result};

/// Validate version, declared length and checksum
///
/// # Errors
///
/// Returns, in check order:
/// - `VersionMismatch` if the version differs from `PROTOCOL_VERSION`
/// - `PayloadLengthOutOfRange` if `payload_len` exceeds `MAX_PAYLOAD`
/// - `ChecksumFailure` if the recomputed checksum differs
pub fn validate_frame(frame: &Frame) -> Result<()> {
    if frame.version != PROTOCOL_VERSION {
        return Err(RcLinkError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: frame.version,
        });
    }

    if frame.payload_len as usize > MAX_PAYLOAD {
        return Err(RcLinkError::PayloadLengthOutOfRange {
            len: frame.payload_len,
            max: MAX_PAYLOAD,
        });
    }

    let calculated = frame.compute_checksum();
    if calculated != frame.checksum {
        return Err(RcLinkError::ChecksumFailure {
            expected: calculated,
            actual: frame.checksum,
        });
    }

    Ok(())
}

/// `true` if [`validate_frame`] passes
pub fn is_valid(frame: &Frame) -> bool {
    validate_frame(frame).is_ok()
}

/// Validate a frame and return its payload
///
/// # Arguments
///
/// * `frame` - Received frame
/// * `expected_type` - Packet type the caller is waiting for
/// * `expected_len` - Payload length the caller expects for that type
///
/// # Returns
///
/// * `Result<&[u8]>` - Payload of exactly `expected_len` bytes
///
/// # Errors
///
/// Any error of [`validate_frame`], then `UnknownPacketType`,
/// `UnexpectedPacketType` or `PayloadLengthMismatch`. The payload is never
/// truncated or padded to fit.
pub fn decode_frame(frame: &Frame, expected_type: PacketType, expected_len: usize) -> Result<&[u8]> {
    validate_frame(frame)?;

    let actual_type = frame.kind()?;
    if actual_type != expected_type {
        return Err(RcLinkError::UnexpectedPacketType {
            expected: expected_type,
            actual: actual_type,
        });
    }

    if frame.payload_len as usize != expected_len {
        return Err(RcLinkError::PayloadLengthMismatch {
            expected: expected_len,
            actual: frame.payload_len as usize,
        });
    }

    Ok(frame.payload())
}

/// Validate a frame and decode a typed payload from it
pub fn decode_payload<P: WirePayload>(frame: &Frame, expected_type: PacketType) -> Result<P> {
    let bytes = decode_frame(frame, expected_type, P::SIZE)?;
    P::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encoder::{encode_frame, encode_payload};
    use crate::packet::payload::{CommandPayload, TelemetryPayload};

    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(37).wrapping_add(1)).collect()
    }

    #[test]
    fn test_round_trip_all_lengths() {
        for len in 0..=MAX_PAYLOAD {
            let payload = sample_payload(len);
            let frame = encode_frame(PacketType::Command, PacketFlags::NONE, len as u8, &payload).unwrap();
            let wire = frame.to_bytes();

            let received = Frame::from_bytes(&wire);
            let decoded = decode_frame(&received, PacketType::Command, len).unwrap();
            assert_eq!(decoded, &payload[..], "length {}", len);
        }
    }

    #[test]
    fn test_single_bit_flip_in_checked_region_fails() {
        let command = CommandPayload::neutral();
        let frame = encode_payload(PacketType::Command, 42, &command).unwrap();
        let wire = frame.to_bytes();
        let checked = HEADER_SIZE + CommandPayload::SIZE;

        for byte in 0..checked {
            for bit in 0..8 {
                let mut corrupted = wire;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !is_valid(&Frame::from_bytes(&corrupted)),
                    "flip of byte {} bit {} went undetected",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_bit_flip_beyond_payload_len_is_ignored() {
        let command = CommandPayload::neutral();
        let frame = encode_payload(PacketType::Command, 42, &command).unwrap();
        let wire = frame.to_bytes();

        for byte in HEADER_SIZE + CommandPayload::SIZE..CHECKSUM_OFFSET {
            for bit in 0..8 {
                let mut padded = wire;
                padded[byte] ^= 1 << bit;
                let received = Frame::from_bytes(&padded);
                assert!(is_valid(&received), "byte {} bit {} should not matter", byte, bit);
                assert_eq!(decode_payload::<CommandPayload>(&received, PacketType::Command).unwrap(), command);
            }
        }
    }

    #[test]
    fn test_version_gate() {
        let mut frame = encode_frame(PacketType::Command, PacketFlags::NONE, 1, &[1, 2, 3]).unwrap();
        frame.version = 2;
        // Checksum is correct for the altered header, version still wins
        frame.checksum = frame.compute_checksum();

        match validate_frame(&frame) {
            Err(RcLinkError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected VersionMismatch, got {:?}", other),
        }
        assert!(decode_frame(&frame, PacketType::Command, 3).is_err());
    }

    #[test]
    fn test_length_checked_before_checksum() {
        let mut frame = encode_frame(PacketType::Command, PacketFlags::NONE, 1, &[]).unwrap();
        frame.payload_len = 27;

        assert!(matches!(
            validate_frame(&frame),
            Err(RcLinkError::PayloadLengthOutOfRange { len: 27, max: 26 })
        ));

        frame.payload_len = 0xFF;
        assert!(matches!(
            validate_frame(&frame),
            Err(RcLinkError::PayloadLengthOutOfRange { .. })
        ));
    }

    #[test]
    fn test_corrupted_command_payload_byte() {
        let command = CommandPayload {
            channels: [1500, 1500, 1100, 1500, 2000, 1000, 1024, 1024],
            switches: 0b0000_0101,
            mode: 2,
        };
        let frame = encode_payload(PacketType::Command, 42, &command).unwrap();
        assert_eq!(frame.payload_len, 18);
        assert_eq!(frame.sequence, 42);

        let mut wire = frame.to_bytes();
        wire[PAYLOAD_OFFSET + 5] ^= 0x10;

        let result = decode_payload::<CommandPayload>(&Frame::from_bytes(&wire), PacketType::Command);
        assert!(matches!(result, Err(RcLinkError::ChecksumFailure { .. })));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut frame = encode_frame(PacketType::Command, PacketFlags::NONE, 1, &[0; 4]).unwrap();
        frame.packet_type = 0x09;
        frame.checksum = frame.compute_checksum();

        assert!(is_valid(&frame));
        assert!(matches!(
            decode_frame(&frame, PacketType::Command, 4),
            Err(RcLinkError::UnknownPacketType(0x09))
        ));
    }

    #[test]
    fn test_unexpected_type_rejected() {
        let frame = encode_payload(PacketType::Telemetry, 5, &TelemetryPayload::default()).unwrap();

        match decode_frame(&frame, PacketType::Command, TelemetryPayload::SIZE) {
            Err(RcLinkError::UnexpectedPacketType { expected, actual }) => {
                assert_eq!(expected, PacketType::Command);
                assert_eq!(actual, PacketType::Telemetry);
            }
            other => panic!("Expected UnexpectedPacketType, got {:?}", other),
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let frame = encode_frame(PacketType::Command, PacketFlags::NONE, 5, &[0; 10]).unwrap();

        assert!(matches!(
            decode_payload::<CommandPayload>(&frame, PacketType::Command),
            Err(RcLinkError::PayloadLengthMismatch { expected: 18, actual: 10 })
        ));
    }

    #[test]
    fn test_unknown_flag_bits_accepted() {
        let frame = encode_frame(PacketType::Heartbeat, PacketFlags::from_bits(0xF0), 1, &[]).unwrap();
        assert!(decode_frame(&frame, PacketType::Heartbeat, 0).is_ok());
    }

    #[test]
    fn test_all_zero_buffer_rejected() {
        let frame = Frame::from_bytes(&[0u8; FRAME_SIZE]);
        assert!(matches!(validate_frame(&frame), Err(RcLinkError::VersionMismatch { .. })));
    }
}
