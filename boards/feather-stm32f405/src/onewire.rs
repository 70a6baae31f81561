#![deny(unsafe_code)]
#![deny(warnings)]
//! 1-Wire bus on a bit-banged open-drain GPIO
//!
//! Adapts the `one-wire-bus` driver to the `OneWireBus` capability used by
//! the core. Bit slots are timed with blocking `embassy_time::Delay`
//! microsecond waits; a full scratchpad read takes a few milliseconds, which
//! is the longest single step of a scheduler tick.
//!
//! # Wiring
//!
//! DQ on D9 (PB8) with an external 4.7 kΩ pull-up to 3V3. Parasite power is
//! not supported.

use embassy_stm32::gpio::OutputOpenDrain;
use embassy_time::Delay;
use one_wire_bus::{Address, OneWire, OneWireError, SearchState};
use thermonode_hal::{OneWireBus, RomCode};

/// Driver error for the GPIO bus
pub type PinBusError = OneWireError<core::convert::Infallible>;

/// 1-Wire master on one open-drain pin
pub struct PinBus {
    wire: OneWire<OutputOpenDrain<'static>>,
    delay: Delay,
    search: Option<SearchState>,
    search_done: bool,
}

impl PinBus {
    pub fn new(pin: OutputOpenDrain<'static>) -> Result<Self, PinBusError> {
        Ok(Self {
            wire: OneWire::new(pin)?,
            delay: Delay,
            search: None,
            search_done: false,
        })
    }
}

impl OneWireBus for PinBus {
    type Error = PinBusError;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        self.wire.reset(&mut self.delay)
    }

    fn select(&mut self, rom: &RomCode) -> Result<(), Self::Error> {
        // ROM bytes are transmitted LSB first, family code first
        let address = Address(u64::from_le_bytes(*rom));
        self.wire.match_address(&address, &mut self.delay)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.wire.write_byte(byte, &mut self.delay)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        self.wire.read_byte(&mut self.delay)
    }

    fn reset_search(&mut self) {
        self.search = None;
        self.search_done = false;
    }

    fn search_next(&mut self) -> Result<Option<RomCode>, Self::Error> {
        if self.search_done {
            return Ok(None);
        }
        match self
            .wire
            .device_search(self.search.as_ref(), false, &mut self.delay)?
        {
            Some((address, state)) => {
                self.search = Some(state);
                Ok(Some(address.0.to_le_bytes()))
            }
            None => {
                self.search_done = true;
                Ok(None)
            }
        }
    }
}
