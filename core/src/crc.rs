//! Dallas/Maxim CRC-8
//!
//! Polynomial x^8 + x^5 + x^4 + 1, processed LSB-first (reflected form 0x8C),
//! zero initial value. Used for both ROM codes and scratchpads: running the
//! CRC over data followed by its own CRC byte yields zero.

/// Reflected polynomial for x^8 + x^5 + x^4 + 1
const POLY_REFLECTED: u8 = 0x8C;

/// Compute the Dallas/Maxim CRC-8 of `data`
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| {
        let mut crc = crc;
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= POLY_REFLECTED;
            }
            byte >>= 1;
        }
        crc
    })
}

/// Check `data` whose last byte is the CRC of the preceding bytes
pub fn check(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&expected, payload)) => crc8(payload) == expected,
        None => false,
    }
}
