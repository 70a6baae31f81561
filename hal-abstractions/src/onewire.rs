//! Single-wire bus capability
//!
//! Mirrors the primitive operations of a standard 1-Wire master. Framing
//! (ROM commands, function commands, timing slots) belongs to the implementor.

/// 64-bit ROM code as it appears on the wire (family code first, CRC last)
pub type RomCode = [u8; 8];

/// Primitive single-wire bus operations
pub trait OneWireBus {
    /// Driver-level error (pin fault, bus shorted low, ...)
    type Error: core::fmt::Debug;

    /// Issue a reset pulse. Returns `true` if at least one device answered
    /// with a presence pulse.
    fn reset(&mut self) -> Result<bool, Self::Error>;

    /// Address a single device (MATCH ROM). Must follow a `reset`.
    fn select(&mut self, rom: &RomCode) -> Result<(), Self::Error>;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Restart ROM search so the next `search_next` yields the first device.
    fn reset_search(&mut self);

    /// Next device found by the ROM search, or `None` once the search is
    /// exhausted.
    fn search_next(&mut self) -> Result<Option<RomCode>, Self::Error>;
}
