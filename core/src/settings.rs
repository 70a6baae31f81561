//! Runtime tuning for the node
//!
//! Values here are compiled in. The persisted [`NodeConfig`](crate::NodeConfig)
//! overrides the poll and error intervals at boot.

use heapless::Vec;

use crate::sensor::{Units, CONVERSION_TIME_MS};
use crate::status::BlinkPattern;

/// Maximum number of monitored alert channels
pub const MAX_CHANNELS: usize = 4;

/// One monitored channel: a sensor position and its allowed band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSpec {
    /// Label used in alerts and log points, e.g. "warm"
    pub label: &'static str,
    /// Preferred position in the scan-ordered device set when the channel
    /// is first bound; afterwards the channel follows the sensor's address
    pub sensor_index: usize,
    pub lower_bound: f32,
    pub upper_bound: f32,
}

/// Node tuning parameters
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub units: Units,
    /// Bus topology rescan period
    pub reconcile_interval_ms: u32,
    /// Wait between issuing a conversion and reading the result
    pub conversion_ms: u32,
    /// Threshold evaluation period
    pub evaluation_interval_ms: u32,
    /// Data point logging period, independent of alert state
    pub log_interval_ms: u32,
    pub heartbeat_interval_ms: u32,
    /// Consecutive failures before a fault cadence is shown
    pub fault_threshold: u8,
    /// LED is lit when the pin is driven low
    pub led_active_low: bool,
    pub healthy_blink: BlinkPattern,
    pub sensor_fault_blink: BlinkPattern,
    pub sink_fault_blink: BlinkPattern,
    pub no_sensors_blink: BlinkPattern,
    pub channels: Vec<ChannelSpec, MAX_CHANNELS>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        let mut channels = Vec::new();
        // Capacity is MAX_CHANNELS; two entries always fit
        let _ = channels.push(ChannelSpec {
            label: "warm",
            sensor_index: 0,
            lower_bound: 26.0,
            upper_bound: 35.0,
        });
        let _ = channels.push(ChannelSpec {
            label: "cool",
            sensor_index: 1,
            lower_bound: 20.0,
            upper_bound: 28.0,
        });

        Self {
            units: Units::Celsius,
            reconcile_interval_ms: 30_000,
            conversion_ms: CONVERSION_TIME_MS,
            evaluation_interval_ms: 1_000,
            log_interval_ms: 60_000,
            heartbeat_interval_ms: 300_000,
            fault_threshold: 3,
            led_active_low: true,
            healthy_blink: BlinkPattern::HEALTHY,
            sensor_fault_blink: BlinkPattern::SENSOR_FAULT,
            sink_fault_blink: BlinkPattern::SINK_FAULT,
            no_sensors_blink: BlinkPattern::NO_SENSORS,
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = NodeSettings::default();
        assert_eq!(settings.units, Units::Celsius);
        assert_eq!(settings.conversion_ms, 750);
        assert_eq!(settings.channels.len(), 2);
        assert_eq!(settings.channels[0].label, "warm");
        assert_eq!(settings.channels[1].sensor_index, 1);
        for channel in &settings.channels {
            assert!(channel.lower_bound < channel.upper_bound);
        }
    }
}
