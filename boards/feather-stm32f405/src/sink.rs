#![deny(unsafe_code)]
#![deny(warnings)]
//! Notifier that reports over the defmt RTT channel
//!
//! Stand-in transport for a node without a network link. Alerts, data
//! points and heartbeats end up in the probe-rs log, one line each.

use defmt::{info, warn};
use thermonode_hal::{AlertMessage, Excursion, Notifier, Sample, SinkError};

/// RTT-backed notifier; never fails
pub struct RttNotifier {
    sequence: u32,
}

impl RttNotifier {
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}

impl Default for RttNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RttNotifier {
    fn send_alert(&mut self, alert: &AlertMessage<'_>) -> Result<(), SinkError> {
        let seq = self.next_sequence();
        let direction = match alert.excursion {
            Excursion::TooCold => "too cold",
            Excursion::TooHot => "too hot",
        };
        warn!(
            "[{=u32}] ALERT {=str} {=str}: {=f32} (limit {=f32}, off by {=f32})",
            seq,
            alert.channel,
            direction,
            alert.value,
            alert.bound,
            alert.magnitude()
        );
        Ok(())
    }

    fn send_log(&mut self, samples: &[Sample<'_>]) -> Result<(), SinkError> {
        let seq = self.next_sequence();
        if samples.is_empty() {
            info!("[{=u32}] DATA (no valid readings)", seq);
        }
        for sample in samples {
            info!("[{=u32}] DATA {=str}={=f32}", seq, sample.channel, sample.value);
        }
        Ok(())
    }

    fn send_heartbeat(&mut self, guid: &[u8; 8], device_count: u8) -> Result<(), SinkError> {
        let seq = self.next_sequence();
        info!(
            "[{=u32}] HEARTBEAT node={:02x} sensors={=u8}",
            seq,
            guid,
            device_count
        );
        Ok(())
    }
}
