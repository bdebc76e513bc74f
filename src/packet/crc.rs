//! # CRC-8 Implementation
//!
//! CRC-8 (SMBus variant) checksum used to detect corrupted frames.
//!
//! **Polynomial**: 0x07 (x^8 + x^2 + x + 1)
//! **Initial Value**: 0x00

/// CRC-8 polynomial
const CRC8_POLY: u8 = 0x07;

/// CRC-8 initial value
pub const CRC8_INIT: u8 = 0x00;

/// Calculate the CRC-8 of a byte slice
///
/// # Arguments
///
/// * `data` - Bytes to checksum (frame header followed by the declared payload)
///
/// # Returns
///
/// * `u8` - Calculated checksum, `CRC8_INIT` for an empty slice
///
/// # Examples
///
/// ```
/// use rc_link::packet::crc::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xF4);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    crc8_update(CRC8_INIT, data)
}

/// Continue a CRC-8 computation over another chunk
///
/// `crc8_update(crc8(a), b) == crc8(a ++ b)`, which lets the codec checksum the
/// header and the payload prefix without copying them into one buffer.
pub fn crc8_update(mut crc: u8, data: &[u8]) -> u8 {
    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
