//! Device addresses and the bounded device set

use heapless::Vec;
use thermonode_hal::RomCode;

use crate::crc;
use crate::error::Error;

/// Maximum number of sensors tracked on one bus
pub const MAX_DEVICES: usize = 8;

/// DS18B20 family code (first ROM byte)
pub const FAMILY_DS18B20: u8 = 0x28;

/// 64-bit single-wire device address, compared byte-exact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub RomCode);

impl DeviceAddress {
    pub const fn new(bytes: RomCode) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &RomCode {
        &self.0
    }

    pub const fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// Whether the trailing ROM byte is the CRC-8 of the first seven
    pub fn is_crc_valid(&self) -> bool {
        crc::check(&self.0)
    }
}

impl From<RomCode> for DeviceAddress {
    fn from(bytes: RomCode) -> Self {
        Self(bytes)
    }
}

impl core::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{=u8:02X}{=u8:02X}{=u8:02X}{=u8:02X}{=u8:02X}{=u8:02X}{=u8:02X}{=u8:02X}",
            self.0[0],
            self.0[1],
            self.0[2],
            self.0[3],
            self.0[4],
            self.0[5],
            self.0[6],
            self.0[7]
        )
    }
}

/// Ordered, capacity-bounded set of device addresses
///
/// Order is the order of the most recent bus scan. Pushing past
/// [`MAX_DEVICES`] is reported, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceSet {
    devices: Vec<DeviceAddress, MAX_DEVICES>,
}

impl DeviceSet {
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    pub fn from_slice(addresses: &[DeviceAddress]) -> Result<Self, Error> {
        let mut set = Self::new();
        for address in addresses {
            set.push(*address)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, address: DeviceAddress) -> Result<(), Error> {
        self.devices
            .push(address)
            .map_err(|_| Error::CapacityExceeded)
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.devices.iter().any(|known| known == address)
    }

    pub fn get(&self, index: usize) -> Option<&DeviceAddress> {
        self.devices.get(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, DeviceAddress> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[DeviceAddress] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        MAX_DEVICES
    }
}

impl<'a> IntoIterator for &'a DeviceSet {
    type Item = &'a DeviceAddress;
    type IntoIter = core::slice::Iter<'a, DeviceAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}
