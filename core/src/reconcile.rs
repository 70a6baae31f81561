//! Bus topology reconciliation
//!
//! Scans the bus for every present device and compares the result with the
//! previously stored [`DeviceSet`] using set semantics. The stored set is
//! replaced with the fresh scan (in scan order) on every successful pass.

use thermonode_hal::OneWireBus;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::address::{DeviceAddress, DeviceSet, FAMILY_DS18B20};
use crate::error::Error;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Reconciliation {
    pub added: u8,
    pub removed: u8,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.added != 0 || self.removed != 0
    }
}

/// Detects sensors appearing on or leaving the bus between scans
pub struct DeviceSetReconciler;

impl DeviceSetReconciler {
    /// Full ROM search, up to the device set capacity
    ///
    /// A bus carrying more devices than the capacity fails with
    /// [`Error::CapacityExceeded`] instead of returning a truncated set.
    pub fn scan<B: OneWireBus>(bus: &mut B) -> Result<DeviceSet, Error> {
        bus.reset_search();
        let mut discovered = DeviceSet::new();
        while let Some(rom) = bus.search_next().map_err(|_| Error::BusFault)? {
            let address = DeviceAddress::new(rom);
            if !address.is_crc_valid() {
                // Noise during the search; the next scan will retry
                warn!("Bus search returned {} with a bad ROM CRC, skipping", address);
                continue;
            }
            if address.family_code() != FAMILY_DS18B20 {
                warn!(
                    "Device {} has family {}, not a DS18B20; readings may be invalid",
                    address,
                    address.family_code()
                );
            }
            if discovered.contains(&address) {
                // A search that repeats itself has wrapped; stop here
                warn!("Bus search repeated {}, stopping", address);
                break;
            }
            if let Err(e) = discovered.push(address) {
                error!(
                    "More than {} devices on the bus, ignoring scan",
                    discovered.capacity()
                );
                return Err(e);
            }
        }
        Ok(discovered)
    }

    /// Compare `previous` against `discovered` as sets
    pub fn diff(previous: &DeviceSet, discovered: &DeviceSet) -> Reconciliation {
        let removed = previous.iter().filter(|a| !discovered.contains(a)).count();
        let added = discovered.iter().filter(|a| !previous.contains(a)).count();
        Reconciliation {
            added: added as u8,
            removed: removed as u8,
        }
    }

    /// Scan, diff against `stored`, and replace `stored` with the scan
    ///
    /// On error `stored` is left untouched.
    pub fn reconcile<B: OneWireBus>(bus: &mut B, stored: &mut DeviceSet) -> Result<Reconciliation, Error> {
        let discovered = Self::scan(bus)?;
        let outcome = Self::diff(stored, &discovered);
        for address in discovered.iter().filter(|a| !stored.contains(a)) {
            info!("Sensor added: {}", address);
        }
        for address in stored.iter().filter(|a| !discovered.contains(a)) {
            info!("Sensor removed: {}", address);
        }
        *stored = discovered;
        if outcome.changed() {
            info!(
                "Bus topology changed: +{} -{} ({} present)",
                outcome.added,
                outcome.removed,
                stored.len()
            );
        }
        Ok(outcome)
    }
}
