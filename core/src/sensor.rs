//! Single-wire temperature measurement
//!
//! Implements the DS18B20 measurement sequence against the [`OneWireBus`]
//! capability:
//!
//! ```text
//! reset, MATCH ROM(address), CONVERT T (0x44)
//!   ... conversion window (up to 750 ms at 12-bit resolution) ...
//! reset, MATCH ROM(address), READ SCRATCHPAD (0xBE), 9 bytes, CRC-8 check
//! ```
//!
//! The conversion window is never waited out in place. [`MeasurementCycle`]
//! splits the sequence into an issue phase and a read phase separated by an
//! [`IntervalTimer`], so the cooperative loop keeps servicing other timers
//! while the sensors convert.

use heapless::Vec;
use thermonode_hal::OneWireBus;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::address::{DeviceAddress, DeviceSet, MAX_DEVICES};
use crate::crc;
use crate::error::Error;
use crate::timer::IntervalTimer;

/// Function command: start temperature conversion
pub const CMD_CONVERT_T: u8 = 0x44;
/// Function command: read the 9-byte scratchpad
pub const CMD_READ_SCRATCHPAD: u8 = 0xBE;

pub const SCRATCHPAD_LEN: usize = 9;

/// Worst-case 12-bit conversion time
pub const CONVERSION_TIME_MS: u32 = 750;

/// Temperature units for readings and alert bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Units {
    #[default]
    Celsius,
    Fahrenheit,
}

impl Units {
    pub fn from_celsius(self, celsius: f32) -> f32 {
        match self {
            Units::Celsius => celsius,
            Units::Fahrenheit => celsius * 1.8 + 32.0,
        }
    }
}

/// One measurement result; an invalid reading's value must not be used
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Reading {
    pub address: DeviceAddress,
    pub value: f32,
    pub valid: bool,
}

impl Reading {
    pub fn valid(address: DeviceAddress, value: f32) -> Self {
        Self {
            address,
            value,
            valid: true,
        }
    }

    pub fn invalid(address: DeviceAddress) -> Self {
        Self {
            address,
            value: 0.0,
            valid: false,
        }
    }

    /// The value if the reading is trustworthy
    pub fn value(&self) -> Option<f32> {
        self.valid.then_some(self.value)
    }
}

/// Readings of one measurement cycle, in snapshot order
pub type Readings = Vec<Reading, MAX_DEVICES>;

/// Validate a scratchpad and decode its temperature in degrees Celsius
///
/// Bytes 0-1 hold a little-endian two's-complement value in 1/16 °C.
pub fn decode_scratchpad(scratchpad: &[u8; SCRATCHPAD_LEN]) -> Result<f32, Error> {
    if !crc::check(scratchpad) {
        return Err(Error::BusCrcMismatch);
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    Ok(raw as f32 / 16.0)
}

fn bus_fault<E: core::fmt::Debug>(_e: E) -> Error {
    Error::BusFault
}

/// Stateless protocol driver for one device at a time
pub struct BusProtocolReader;

impl BusProtocolReader {
    /// Phase 1: start a conversion on `address`
    pub fn start_conversion<B: OneWireBus>(bus: &mut B, address: &DeviceAddress) -> Result<(), Error> {
        if !bus.reset().map_err(bus_fault)? {
            return Err(Error::BusFault);
        }
        bus.select(address.as_bytes()).map_err(bus_fault)?;
        bus.write_byte(CMD_CONVERT_T).map_err(bus_fault)?;
        Ok(())
    }

    /// Phase 2: fetch the scratchpad of `address`
    pub fn read_scratchpad<B: OneWireBus>(
        bus: &mut B,
        address: &DeviceAddress,
    ) -> Result<[u8; SCRATCHPAD_LEN], Error> {
        if !bus.reset().map_err(bus_fault)? {
            return Err(Error::ConversionTimeout);
        }
        bus.select(address.as_bytes()).map_err(bus_fault)?;
        bus.write_byte(CMD_READ_SCRATCHPAD).map_err(bus_fault)?;

        let mut scratchpad = [0u8; SCRATCHPAD_LEN];
        for byte in scratchpad.iter_mut() {
            *byte = bus.read_byte().map_err(bus_fault)?;
        }
        Ok(scratchpad)
    }

    /// Phase 2 plus validation and unit conversion
    pub fn read_temperature<B: OneWireBus>(
        bus: &mut B,
        address: &DeviceAddress,
        units: Units,
    ) -> Result<f32, Error> {
        let scratchpad = Self::read_scratchpad(bus, address)?;
        let celsius = decode_scratchpad(&scratchpad)?;
        Ok(units.from_celsius(celsius))
    }

    /// Phase 2 as a [`Reading`]; failures yield an invalid reading
    pub fn read<B: OneWireBus>(bus: &mut B, address: &DeviceAddress, units: Units) -> (Reading, Option<Error>) {
        match Self::read_temperature(bus, address, units) {
            Ok(value) => (Reading::valid(*address, value), None),
            Err(e) => {
                warn!("Sensor {} read failed: {}", address, e);
                (Reading::invalid(*address), Some(e))
            }
        }
    }
}

/// Phase of the two-step measurement sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Phase {
    Idle,
    AwaitingConversion { started_at: u32 },
}

/// Result of one completed measurement cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub readings: Readings,
    /// Number of readings invalidated by CRC or timeout
    pub failures: u8,
    /// Most recent per-device failure in the cycle
    pub last_error: Option<Error>,
}

impl CycleReport {
    pub fn valid_count(&self) -> usize {
        self.readings.iter().filter(|r| r.valid).count()
    }
}

/// Drives issue-conversion / read-result as two scheduled phases
///
/// Every device in the snapshot gets its own [`Reading`]; a failure on one
/// device never suppresses its siblings.
#[derive(Debug, Clone)]
pub struct MeasurementCycle {
    phase: Phase,
    conversion_timer: IntervalTimer,
    snapshot: Vec<DeviceAddress, MAX_DEVICES>,
    units: Units,
}

impl MeasurementCycle {
    pub fn new(conversion_ms: u32, units: Units, now_ms: u32) -> Self {
        Self {
            phase: Phase::Idle,
            conversion_timer: IntervalTimer::new(conversion_ms, now_ms),
            snapshot: Vec::new(),
            units,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Issue conversions to every device in `devices`
    ///
    /// Returns the number of conversions started. Ignored while a cycle is
    /// already in flight. Devices that fail to start are still read in
    /// phase 2 so they produce an explicit invalid reading.
    pub fn begin<B: OneWireBus>(&mut self, bus: &mut B, devices: &DeviceSet, now_ms: u32) -> usize {
        if !self.is_idle() {
            debug!("Measurement already in flight, skipping start");
            return 0;
        }
        self.snapshot.clear();
        let mut started = 0;
        for address in devices {
            // DeviceSet and snapshot share MAX_DEVICES, so this cannot fail
            let _ = self.snapshot.push(*address);
            match BusProtocolReader::start_conversion(bus, address) {
                Ok(()) => started += 1,
                Err(e) => warn!("Sensor {} conversion start failed: {}", address, e),
            }
        }
        if self.snapshot.is_empty() {
            return 0;
        }
        self.conversion_timer.reset(now_ms, None);
        self.phase = Phase::AwaitingConversion { started_at: now_ms };
        trace!("Conversion started on {} sensor(s)", started);
        started
    }

    /// Complete the cycle once the conversion window has elapsed
    ///
    /// Returns `None` while idle or still converting.
    pub fn complete<B: OneWireBus>(&mut self, bus: &mut B, now_ms: u32) -> Option<CycleReport> {
        let Phase::AwaitingConversion { started_at } = self.phase else {
            return None;
        };
        if !self.conversion_timer.poll(now_ms) {
            return None;
        }
        trace!(
            "Conversion window elapsed after {} ms",
            now_ms.wrapping_sub(started_at)
        );

        let mut report = CycleReport {
            readings: Vec::new(),
            failures: 0,
            last_error: None,
        };
        for address in &self.snapshot {
            let (reading, error) = BusProtocolReader::read(bus, address, self.units);
            if let Some(e) = error {
                report.failures += 1;
                report.last_error = Some(e);
            }
            let _ = report.readings.push(reading);
        }
        self.phase = Phase::Idle;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratchpad_for_raw, sim_address, Op, SimBus};

    #[test]
    fn test_decode_25_0625() {
        let pad = scratchpad_for_raw(0x0191);
        assert_eq!(decode_scratchpad(&pad), Ok(25.0625));
    }

    #[test]
    fn test_decode_negative() {
        // -10.125 °C = 0xFF5E
        let pad = scratchpad_for_raw(0xFF5E_u16 as i16);
        assert_eq!(decode_scratchpad(&pad), Ok(-10.125));
    }

    #[test]
    fn test_any_single_corrupted_byte_is_rejected() {
        let pad = scratchpad_for_raw(0x0191);
        for index in 0..SCRATCHPAD_LEN {
            for flip in [0x01u8, 0x80, 0xFF] {
                let mut corrupted = pad;
                corrupted[index] ^= flip;
                assert_eq!(
                    decode_scratchpad(&corrupted),
                    Err(Error::BusCrcMismatch),
                    "byte {} flip {:#x}",
                    index,
                    flip
                );
            }
        }
    }

    #[test]
    fn test_fahrenheit() {
        assert!((Units::Fahrenheit.from_celsius(25.0) - 77.0).abs() < 1e-4);
        assert!((Units::Fahrenheit.from_celsius(-40.0) + 40.0).abs() < 1e-4);
        assert_eq!(Units::Celsius.from_celsius(21.5), 21.5);
    }

    #[test]
    fn test_protocol_sequence() {
        let a = sim_address(1);
        let mut bus = SimBus::new(&[(a, 0x0191)]);
        BusProtocolReader::start_conversion(&mut bus, &a).unwrap();
        let value = BusProtocolReader::read_temperature(&mut bus, &a, Units::Celsius).unwrap();
        assert_eq!(value, 25.0625);
        let mut expected = std::vec![
            Op::Reset,
            Op::Select(a.0),
            Op::Write(0x44),
            Op::Reset,
            Op::Select(a.0),
            Op::Write(0xBE),
        ];
        expected.extend([Op::Read; SCRATCHPAD_LEN]);
        assert_eq!(bus.trace(), expected.as_slice());
    }

    #[test]
    fn test_missing_presence_during_read_is_timeout() {
        let a = sim_address(1);
        let mut bus = SimBus::new(&[(a, 0x0191)]);
        bus.set_presence(false);
        assert_eq!(
            BusProtocolReader::read_temperature(&mut bus, &a, Units::Celsius),
            Err(Error::ConversionTimeout)
        );
        assert_eq!(
            BusProtocolReader::start_conversion(&mut bus, &a),
            Err(Error::BusFault)
        );
    }

    #[test]
    fn test_cycle_waits_for_conversion_window() {
        let a = sim_address(1);
        let mut bus = SimBus::new(&[(a, 0x0191)]);
        let devices = DeviceSet::from_slice(&[a]).unwrap();
        let mut cycle = MeasurementCycle::new(750, Units::Celsius, 0);

        assert_eq!(cycle.begin(&mut bus, &devices, 1_000), 1);
        assert_eq!(cycle.phase(), Phase::AwaitingConversion { started_at: 1_000 });
        // A second start while converting is ignored
        assert_eq!(cycle.begin(&mut bus, &devices, 1_100), 0);
        assert!(cycle.complete(&mut bus, 1_749).is_none());

        let report = cycle.complete(&mut bus, 1_750).unwrap();
        assert!(cycle.is_idle());
        assert_eq!(report.readings.len(), 1);
        assert_eq!(report.readings[0].value(), Some(25.0625));
        assert_eq!(report.failures, 0);
        assert!(cycle.complete(&mut bus, 5_000).is_none());
    }

    #[test]
    fn test_crc_failure_does_not_suppress_siblings() {
        let a = sim_address(1);
        let b = sim_address(2);
        let c = sim_address(3);
        let mut bus = SimBus::new(&[(a, 0x0191), (b, 0x0150), (c, 0x0200)]);
        bus.corrupt(&b);
        let devices = DeviceSet::from_slice(&[a, b, c]).unwrap();
        let mut cycle = MeasurementCycle::new(750, Units::Celsius, 0);

        cycle.begin(&mut bus, &devices, 0);
        let report = cycle.complete(&mut bus, 750).unwrap();
        assert_eq!(report.readings.len(), 3);
        assert_eq!(report.readings[0].value(), Some(25.0625));
        assert!(!report.readings[1].valid);
        assert_eq!(report.readings[1].value(), None);
        assert_eq!(report.readings[2].value(), Some(32.0));
        assert_eq!(report.failures, 1);
        assert_eq!(report.last_error, Some(Error::BusCrcMismatch));
        assert_eq!(report.valid_count(), 2);
    }

    #[test]
    fn test_cycle_reads_snapshot_not_current_set() {
        let a = sim_address(1);
        let b = sim_address(2);
        let mut bus = SimBus::new(&[(a, 0x0191), (b, 0x0150)]);
        let mut devices = DeviceSet::from_slice(&[a]).unwrap();
        let mut cycle = MeasurementCycle::new(750, Units::Celsius, 0);

        cycle.begin(&mut bus, &devices, 0);
        devices.push(b).unwrap();
        let report = cycle.complete(&mut bus, 750).unwrap();
        assert_eq!(report.readings.len(), 1);
        assert_eq!(report.readings[0].address, a);
    }

    #[test]
    fn test_empty_set_stays_idle() {
        let mut bus = SimBus::new(&[]);
        let mut cycle = MeasurementCycle::new(750, Units::Celsius, 0);
        assert_eq!(cycle.begin(&mut bus, &DeviceSet::new(), 0), 0);
        assert!(cycle.is_idle());
    }
}
