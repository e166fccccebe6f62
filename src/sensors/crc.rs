//! Sensirion CRC-8 as used by both the SHT3x and SGP4x families.
//!
//! Polynomial 0x31 (x^8 + x^5 + x^4 + 1), init 0xFF, no reflection, no
//! final XOR.  Every 16-bit word on the wire is followed by its CRC byte.

use crate::error::SensorError;

const POLYNOMIAL: u8 = 0x31;
const INIT: u8 = 0xFF;

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Big-endian word followed by its CRC, ready to append to a command.
pub fn word_with_crc(word: u16) -> [u8; 3] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, crc8(&[msb, lsb])]
}

/// Decode one `[msb, lsb, crc]` triple, rejecting it if the CRC is wrong.
pub fn checked_word(triple: [u8; 3]) -> Result<u16, SensorError> {
    let [msb, lsb, crc] = triple;
    if crc8(&[msb, lsb]) != crc {
        return Err(SensorError::Checksum);
    }
    Ok(u16::from_be_bytes([msb, lsb]))
}
