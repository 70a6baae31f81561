//! Hardware abstraction traits for the thermonode firmware
//!
//! This crate defines the capabilities the platform-agnostic core needs from
//! the outside world. BSPs implement these traits; host tests fake them.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod onewire;
pub mod sink;
pub mod storage;

pub use onewire::{OneWireBus, RomCode};
pub use sink::{AlertMessage, Excursion, Notifier, Sample, SinkError};
pub use storage::BlobStore;
