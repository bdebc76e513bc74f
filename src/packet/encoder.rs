//! # Frame Encoder
//!
//! Builds wire frames from a packet type, sequence number and payload.

use super::frame::*;
use super::payload::WirePayload;
use crate::error::{RcLinkError, Result};

/// Encode a payload into a new frame
///
/// # Arguments
///
/// * `packet_type` - Packet type
/// * `flags` - Flag bits
/// * `sequence` - Sender sequence number
/// * `payload` - Payload bytes (at most `MAX_PAYLOAD`)
///
/// # Returns
///
/// * `Result<Frame>` - Sealed frame with checksum
///
/// # Errors
///
/// Returns `PacketTooLarge` if `payload` exceeds `MAX_PAYLOAD`
///
/// # Examples
///
/// ```
/// use rc_link::packet::encoder::encode_frame;
/// use rc_link::packet::frame::{PacketFlags, PacketType, FRAME_SIZE};
///
/// let frame = encode_frame(PacketType::Command, PacketFlags::NONE, 42, &[1, 2, 3]).unwrap();
/// assert_eq!(frame.payload_len, 3);
/// assert_eq!(frame.to_bytes().len(), FRAME_SIZE);
/// ```
pub fn encode_frame(
    packet_type: PacketType,
    flags: PacketFlags,
    sequence: u8,
    payload: &[u8],
) -> Result<Frame> {
    let mut frame = Frame::default();
    encode_into(&mut frame, packet_type, flags, sequence, payload)?;
    Ok(frame)
}

/// Encode a payload into an existing frame, reusing its storage
///
/// Unused trailing payload bytes are zeroed. On error the frame is left untouched.
pub fn encode_into(
    frame: &mut Frame,
    packet_type: PacketType,
    flags: PacketFlags,
    sequence: u8,
    payload: &[u8],
) -> Result<()> {
    check_capacity(payload.len())?;

    write_header(frame, packet_type, flags, sequence, payload.len());
    frame.payload[..payload.len()].copy_from_slice(payload);
    seal(frame);

    Ok(())
}

/// Encode a typed payload into an existing frame
pub fn encode_payload_into<P: WirePayload>(
    frame: &mut Frame,
    packet_type: PacketType,
    flags: PacketFlags,
    sequence: u8,
    payload: &P,
) -> Result<()> {
    check_capacity(P::SIZE)?;

    write_header(frame, packet_type, flags, sequence, P::SIZE);
    payload.encode(&mut frame.payload[..P::SIZE])?;
    seal(frame);

    Ok(())
}

/// Encode a typed payload into a new frame
pub fn encode_payload<P: WirePayload>(
    packet_type: PacketType,
    sequence: u8,
    payload: &P,
) -> Result<Frame> {
    let mut frame = Frame::default();
    encode_payload_into(&mut frame, packet_type, PacketFlags::NONE, sequence, payload)?;
    Ok(frame)
}

/// Encode an empty keep-alive frame
pub fn encode_heartbeat(sequence: u8) -> Frame {
    let mut frame = Frame::default();
    write_header(&mut frame, PacketType::Heartbeat, PacketFlags::NONE, sequence, 0);
    seal(&mut frame);
    frame
}

/// Encode an empty emergency frame with the emergency flag set
pub fn encode_emergency(sequence: u8) -> Frame {
    let mut frame = Frame::default();
    write_header(&mut frame, PacketType::Emergency, PacketFlags::EMERGENCY, sequence, 0);
    seal(&mut frame);
    frame
}

fn check_capacity(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(RcLinkError::PacketTooLarge {
            len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

// Caller guarantees payload_len <= MAX_PAYLOAD
fn write_header(
    frame: &mut Frame,
    packet_type: PacketType,
    flags: PacketFlags,
    sequence: u8,
    payload_len: usize,
) {
    frame.version = PROTOCOL_VERSION;
    frame.packet_type = packet_type.as_u8();
    frame.sequence = sequence;
    frame.flags = flags;
    frame.payload_len = payload_len as u8;
    frame.payload = [0u8; MAX_PAYLOAD];
}

fn seal(frame: &mut Frame) {
    frame.checksum = frame.compute_checksum();
}
