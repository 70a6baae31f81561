//! Platform-agnostic core logic for the thermonode firmware
//!
//! This crate contains the temperature node's business logic: interval
//! timers, the single-wire measurement protocol, bus topology
//! reconciliation, threshold alerting and the persisted configuration
//! format. It has NO hardware dependencies; everything physical is reached
//! through the traits in `thermonode-hal`.
//!
//! ## Architecture
//! - [`Node`] owns every component and is driven by [`Node::tick`] from a
//!   single cooperative loop
//! - Each periodic activity is gated by its own [`IntervalTimer`]
//! - The sensor conversion wait is a scheduled phase, never a sleep

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod address;
pub mod alert;
pub mod config;
pub mod crc;
pub mod error;
pub mod node;
pub mod reconcile;
pub mod sensor;
pub mod settings;
pub mod status;
pub mod timer;

#[cfg(test)]
mod testing;

pub use address::{DeviceAddress, DeviceSet, MAX_DEVICES};
pub use alert::{AlertState, ChannelAlertState, ThresholdAlertEngine};
pub use config::NodeConfig;
pub use error::Error;
pub use node::Node;
pub use reconcile::{DeviceSetReconciler, Reconciliation};
pub use sensor::{MeasurementCycle, Reading, Units};
pub use settings::{ChannelSpec, NodeSettings, MAX_CHANNELS};
pub use status::{BlinkPattern, Health, StatusIndicator};
pub use timer::IntervalTimer;
