//! Core error types

#[cfg(feature = "defmt")]
use defmt::Format;

/// Errors surfaced by the node's components
///
/// Bus and reconciliation errors are local to one cycle and retried on the
/// next tick. Store errors surface to boot. Sink errors are counted and
/// never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Error {
    /// Scratchpad CRC did not match; the reading is discarded
    BusCrcMismatch,
    /// Device stopped answering during the conversion window
    ConversionTimeout,
    /// Bus driver error, or no presence pulse when addressing a device
    BusFault,
    /// Notification or log call failed
    SinkUnavailable,
    /// Config load/save failed at the storage layer
    StoreUnavailable,
    /// More devices than the fixed capacity
    CapacityExceeded,
    /// Buffer ended before the declared content
    Truncated,
    /// Destination buffer cannot hold the encoded content
    BufferTooSmall,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BusCrcMismatch => write!(f, "Scratchpad CRC mismatch"),
            Self::ConversionTimeout => write!(f, "Conversion timeout"),
            Self::BusFault => write!(f, "Bus fault"),
            Self::SinkUnavailable => write!(f, "Sink unavailable"),
            Self::StoreUnavailable => write!(f, "Store unavailable"),
            Self::CapacityExceeded => write!(f, "Capacity exceeded"),
            Self::Truncated => write!(f, "Truncated buffer"),
            Self::BufferTooSmall => write!(f, "Buffer too small"),
        }
    }
}

impl core::error::Error for Error {}

impl From<thermonode_hal::SinkError> for Error {
    fn from(_: thermonode_hal::SinkError) -> Self {
        Error::SinkUnavailable
    }
}
