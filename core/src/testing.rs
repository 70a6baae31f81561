//! Host-side fakes for the hardware capabilities
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::string::String;
use std::vec::Vec;

use thermonode_hal::{AlertMessage, BlobStore, Excursion, Notifier, OneWireBus, RomCode, Sample, SinkError};

use crate::address::{DeviceAddress, FAMILY_DS18B20};
use crate::crc::crc8;

/// DS18B20 power-on scratchpad value (85 °C)
const POWER_ON_RAW: i16 = 0x0550;

/// Address with a valid ROM CRC
pub fn sim_address(serial: u8) -> DeviceAddress {
    let mut rom = [FAMILY_DS18B20, serial, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    rom[7] = crc8(&rom[..7]);
    DeviceAddress::new(rom)
}

/// DS18B20 scratchpad with a correct CRC for `raw` sixteenths of a degree
pub fn scratchpad_for_raw(raw: i16) -> [u8; 9] {
    let [lo, hi] = raw.to_le_bytes();
    let mut pad = [lo, hi, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
    pad[8] = crc8(&pad[..8]);
    pad
}

/// Raw value for a Celsius temperature on the 1/16 °C grid
pub fn raw_for(celsius: f32) -> i16 {
    (celsius * 16.0) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset,
    Select(RomCode),
    Write(u8),
    Read,
}

#[derive(Debug)]
pub struct SimBusError;

struct SimDevice {
    address: DeviceAddress,
    raw: i16,
    converted: bool,
    corrupt: bool,
}

/// Simulated bus with DS18B20-like devices, in search order
pub struct SimBus {
    devices: Vec<SimDevice>,
    presence: bool,
    fail_search: bool,
    selected: Option<usize>,
    read_queue: VecDeque<u8>,
    search_pos: usize,
    trace: Vec<Op>,
}

impl SimBus {
    pub fn new(devices: &[(DeviceAddress, i16)]) -> Self {
        Self {
            devices: devices
                .iter()
                .map(|&(address, raw)| SimDevice {
                    address,
                    raw,
                    converted: false,
                    corrupt: false,
                })
                .collect(),
            presence: true,
            fail_search: false,
            selected: None,
            read_queue: VecDeque::new(),
            search_pos: 0,
            trace: Vec::new(),
        }
    }

    pub fn trace(&self) -> &[Op] {
        &self.trace
    }

    pub fn set_presence(&mut self, presence: bool) {
        self.presence = presence;
    }

    pub fn set_fail_search(&mut self, fail: bool) {
        self.fail_search = fail;
    }

    /// Flip a temperature bit in every scratchpad `address` returns
    pub fn corrupt(&mut self, address: &DeviceAddress) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.address == *address) {
            device.corrupt = true;
        }
    }

    pub fn repair(&mut self, address: &DeviceAddress) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.address == *address) {
            device.corrupt = false;
        }
    }

    pub fn set_raw(&mut self, address: &DeviceAddress, raw: i16) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.address == *address) {
            device.raw = raw;
        }
    }

    pub fn attach(&mut self, address: DeviceAddress, raw: i16) {
        self.devices.push(SimDevice {
            address,
            raw,
            converted: false,
            corrupt: false,
        });
    }

    pub fn detach(&mut self, address: &DeviceAddress) {
        self.devices.retain(|d| d.address != *address);
    }
}

impl OneWireBus for SimBus {
    type Error = SimBusError;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        self.trace.push(Op::Reset);
        self.selected = None;
        self.read_queue.clear();
        Ok(self.presence && !self.devices.is_empty())
    }

    fn select(&mut self, rom: &RomCode) -> Result<(), Self::Error> {
        self.trace.push(Op::Select(*rom));
        self.selected = self.devices.iter().position(|d| d.address.0 == *rom);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.trace.push(Op::Write(byte));
        let Some(index) = self.selected else {
            return Ok(());
        };
        let device = &mut self.devices[index];
        match byte {
            0x44 => device.converted = true,
            0xBE => {
                let raw = if device.converted { device.raw } else { POWER_ON_RAW };
                let mut pad = scratchpad_for_raw(raw);
                if device.corrupt {
                    pad[0] ^= 0x04;
                }
                self.read_queue.extend(pad);
            }
            _ => {}
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        self.trace.push(Op::Read);
        // Released bus reads as all ones
        Ok(self.read_queue.pop_front().unwrap_or(0xFF))
    }

    fn reset_search(&mut self) {
        self.search_pos = 0;
    }

    fn search_next(&mut self) -> Result<Option<RomCode>, Self::Error> {
        if self.fail_search {
            return Err(SimBusError);
        }
        let next = self.devices.get(self.search_pos).map(|d| d.address.0);
        if next.is_some() {
            self.search_pos += 1;
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAlert {
    pub channel: String,
    pub value: f32,
    pub bound: f32,
    pub excursion: Excursion,
}

/// Notifier that records every call and can be told to fail
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Vec<RecordedAlert>,
    pub logs: Vec<Vec<(String, f32)>>,
    pub heartbeats: Vec<([u8; 8], u8)>,
    pub fail_with: Option<SinkError>,
}

impl RecordingNotifier {
    fn outcome(&self) -> Result<(), SinkError> {
        match self.fail_with {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send_alert(&mut self, alert: &AlertMessage<'_>) -> Result<(), SinkError> {
        self.outcome()?;
        self.alerts.push(RecordedAlert {
            channel: alert.channel.into(),
            value: alert.value,
            bound: alert.bound,
            excursion: alert.excursion,
        });
        Ok(())
    }

    fn send_log(&mut self, samples: &[Sample<'_>]) -> Result<(), SinkError> {
        self.outcome()?;
        self.logs
            .push(samples.iter().map(|s| (s.channel.into(), s.value)).collect());
        Ok(())
    }

    fn send_heartbeat(&mut self, guid: &[u8; 8], device_count: u8) -> Result<(), SinkError> {
        self.outcome()?;
        self.heartbeats.push((*guid, device_count));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemStoreError {
    Offline,
    NotFound,
    TooLarge,
}

/// In-memory blob store
#[derive(Default)]
pub struct MemStore {
    pub blobs: HashMap<String, Vec<u8>>,
    pub offline: bool,
}

impl BlobStore for MemStore {
    type Error = MemStoreError;

    fn read(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.offline {
            return Err(MemStoreError::Offline);
        }
        let blob = self.blobs.get(name).ok_or(MemStoreError::NotFound)?;
        if blob.len() > buf.len() {
            return Err(MemStoreError::TooLarge);
        }
        buf[..blob.len()].copy_from_slice(blob);
        Ok(blob.len())
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.offline {
            return Err(MemStoreError::Offline);
        }
        self.blobs.insert(name.into(), bytes.to_vec());
        Ok(())
    }
}

/// Output pin that remembers its level
#[derive(Debug, Default)]
pub struct FakeLed {
    pub high: bool,
    pub writes: u32,
}

impl embedded_hal::digital::ErrorType for FakeLed {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for FakeLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}
