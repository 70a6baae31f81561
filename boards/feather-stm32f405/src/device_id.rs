#![deny(unsafe_code)]
#![deny(warnings)]
//! Node identity from the STM32F405 unique device ID
//!
//! The factory-programmed 96-bit UID is stable across reboots and unique to
//! each chip. A node whose persisted guid is still all zero adopts a guid
//! derived from it.

/// Get the STM32F405 unique device ID as a hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// Fold the 12-byte UID into an 8-byte node guid
///
/// The last four UID bytes are XORed into the upper half so every UID bit
/// contributes.
pub fn node_guid() -> [u8; 8] {
    fold_uid(embassy_stm32::uid::uid())
}

fn fold_uid(uid: &[u8; 12]) -> [u8; 8] {
    let mut guid = [0u8; 8];
    guid.copy_from_slice(&uid[..8]);
    for (slot, byte) in guid[4..].iter_mut().zip(&uid[8..]) {
        *slot ^= byte;
    }
    guid
}
