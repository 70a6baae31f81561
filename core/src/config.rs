//! Persisted node configuration and its binary layout
//!
//! Fixed-width, little-endian, no padding:
//!
//! ```text
//! offset  size  field
//!      0     8  guid
//!      8     4  poll_interval_ms   (u32 LE)
//!     12     4  error_interval_ms  (u32 LE)
//!     16     1  sensor_count       (u8, <= MAX_DEVICES)
//!     17  8*n   device addresses   (ROM byte order)
//! ```
//!
//! Decoding checks the declared count against the capacity before touching
//! any record, and every read is bounds-checked against the input length.

use thermonode_hal::BlobStore;

use crate::address::{DeviceAddress, DeviceSet, MAX_DEVICES};
use crate::error::Error;

/// Blob name under which the config is stored
pub const CONFIG_BLOB: &str = "config";

const HEADER_LEN: usize = 17;
const RECORD_LEN: usize = 8;

/// Largest possible encoding
pub const MAX_ENCODED_LEN: usize = HEADER_LEN + MAX_DEVICES * RECORD_LEN;

/// Default measurement cadence
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10_000;
/// Default re-alert cooldown
pub const DEFAULT_ERROR_INTERVAL_MS: u32 = 3_600_000;

/// Node identity, cadences and the last known bus topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub guid: [u8; 8],
    pub poll_interval_ms: u32,
    pub error_interval_ms: u32,
    pub devices: DeviceSet,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            guid: [0; 8],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            error_interval_ms: DEFAULT_ERROR_INTERVAL_MS,
            devices: DeviceSet::new(),
        }
    }
}

/// Bounds-checked cursor over an input buffer
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let end = self.pos.checked_add(N).ok_or(Error::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(Error::Truncated)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take::<1>()?[0])
    }

    fn u32_le(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }
}

impl NodeConfig {
    /// Bytes needed to encode this config
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.devices.len() * RECORD_LEN
    }

    /// Serialize into `buf`, returning the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let len = self.encoded_len();
        let out = buf.get_mut(..len).ok_or(Error::BufferTooSmall)?;

        out[0..8].copy_from_slice(&self.guid);
        out[8..12].copy_from_slice(&self.poll_interval_ms.to_le_bytes());
        out[12..16].copy_from_slice(&self.error_interval_ms.to_le_bytes());
        // DeviceSet never exceeds MAX_DEVICES, which fits in a u8
        out[16] = self.devices.len() as u8;
        for (record, address) in out[HEADER_LEN..]
            .chunks_exact_mut(RECORD_LEN)
            .zip(self.devices.iter())
        {
            record.copy_from_slice(address.as_bytes());
        }
        Ok(len)
    }

    /// Parse a config from `buf`; trailing bytes are ignored
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(buf);
        let guid = reader.take::<8>()?;
        let poll_interval_ms = reader.u32_le()?;
        let error_interval_ms = reader.u32_le()?;
        let sensor_count = reader.u8()? as usize;
        if sensor_count > MAX_DEVICES {
            return Err(Error::CapacityExceeded);
        }

        let mut devices = DeviceSet::new();
        for _ in 0..sensor_count {
            devices.push(DeviceAddress::new(reader.take::<RECORD_LEN>()?))?;
        }

        Ok(Self {
            guid,
            poll_interval_ms,
            error_interval_ms,
            devices,
        })
    }
}

/// Read and decode the config blob
///
/// Storage failures map to [`Error::StoreUnavailable`]; malformed content
/// keeps its codec error. Callers fall back to [`NodeConfig::default`].
pub fn load<S: BlobStore>(store: &mut S) -> Result<NodeConfig, Error> {
    let mut buf = [0u8; MAX_ENCODED_LEN];
    let len = store.read(CONFIG_BLOB, &mut buf).map_err(|e| {
        error!("Config read failed: {}", debug_fmt(&e));
        Error::StoreUnavailable
    })?;
    NodeConfig::decode(&buf[..len])
}

/// Encode and write the config blob
pub fn save<S: BlobStore>(store: &mut S, config: &NodeConfig) -> Result<(), Error> {
    let mut buf = [0u8; MAX_ENCODED_LEN];
    let len = config.encode(&mut buf)?;
    store.write(CONFIG_BLOB, &buf[..len]).map_err(|e| {
        error!("Config write failed: {}", debug_fmt(&e));
        Error::StoreUnavailable
    })
}

/// Debug-format a store error for the log
#[cfg(feature = "defmt")]
fn debug_fmt<T: core::fmt::Debug>(value: &T) -> defmt::Debug2Format<'_, T> {
    defmt::Debug2Format(value)
}

#[cfg(not(feature = "defmt"))]
fn debug_fmt<T: core::fmt::Debug>(value: &T) -> &T {
    value
}
