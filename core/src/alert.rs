//! Threshold alerting with per-channel hysteresis
//!
//! Each channel is a two-state machine:
//!
//! ```text
//!            out of bounds && warning timer due  (notify, re-arm)
//!   Normal ------------------------------------------> Alerting
//!     ^                                                  |  out of bounds,
//!     |          back in bounds (no notification)        |  timer not due:
//!     +--------------------------------------------------+  suppressed
//! ```
//!
//! The warning timer is the debounce: at most one notification per channel
//! per warning interval, however often the value crosses its bounds. A
//! separate logging timer emits a data point on its own cadence regardless of
//! alert state.
//!
//! Channels are bound to a sensor by address, not by position. A removed
//! sensor leaves its channel without a value; it never hands the channel to a
//! neighbour's reading.

use heapless::Vec;
use thermonode_hal::{AlertMessage, Excursion, Notifier, Sample, SinkError};

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::address::{DeviceAddress, DeviceSet};
use crate::error::Error;
use crate::sensor::Reading;
use crate::settings::{ChannelSpec, MAX_CHANNELS};
use crate::timer::IntervalTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum AlertState {
    Normal,
    Alerting,
}

/// Alert state of one monitored channel
#[derive(Debug, Clone)]
pub struct ChannelAlertState {
    spec: ChannelSpec,
    warning_timer: IntervalTimer,
    state: AlertState,
    sensor: Option<DeviceAddress>,
    last_value: Option<f32>,
}

impl ChannelAlertState {
    /// The warning timer starts due, so the first excursion alerts at once
    pub fn new(spec: ChannelSpec, warning_interval_ms: u32, now_ms: u32) -> Self {
        Self {
            spec,
            warning_timer: IntervalTimer::new_due(warning_interval_ms, now_ms),
            state: AlertState::Normal,
            sensor: None,
            last_value: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.spec.label
    }

    pub fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn last_value(&self) -> Option<f32> {
        self.last_value
    }

    /// Address of the sensor feeding this channel
    pub fn sensor(&self) -> Option<DeviceAddress> {
        self.sensor
    }

    /// Which bound `value` violates, if any
    pub fn excursion(&self, value: f32) -> Option<(Excursion, f32)> {
        if value < self.spec.lower_bound {
            Some((Excursion::TooCold, self.spec.lower_bound))
        } else if value > self.spec.upper_bound {
            Some((Excursion::TooHot, self.spec.upper_bound))
        } else {
            None
        }
    }

    /// Run one evaluation; returns the alert to send, if any
    pub fn evaluate(&mut self, value: f32, now_ms: u32) -> Option<AlertMessage<'static>> {
        let Some((excursion, bound)) = self.excursion(value) else {
            if self.state == AlertState::Alerting {
                info!("Channel {} back in bounds at {}", self.spec.label, value);
                self.state = AlertState::Normal;
            }
            return None;
        };

        if !self.warning_timer.poll(now_ms) {
            trace!(
                "Channel {} still out of bounds, alert suppressed for {} ms",
                self.spec.label,
                self.warning_timer.remaining_ms(now_ms)
            );
            return None;
        }

        self.state = AlertState::Alerting;
        Some(AlertMessage {
            channel: self.spec.label,
            value,
            bound,
            excursion,
        })
    }
}

/// Result of one engine tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct EngineReport {
    pub evaluated: bool,
    pub alerts_sent: u8,
    pub logged: bool,
    pub sink_failures: u8,
}

impl EngineReport {
    /// Whether any sink call was attempted this tick
    pub fn sink_used(&self) -> bool {
        self.alerts_sent != 0 || self.logged || self.sink_failures != 0
    }
}

/// Failure bookkeeping for the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkStatus {
    pub total_failures: u32,
    pub last_error: Option<SinkError>,
}

impl SinkStatus {
    fn record(&mut self, result: Result<(), SinkError>, report: &mut EngineReport) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Sink call failed: {}", e);
                self.total_failures = self.total_failures.saturating_add(1);
                self.last_error = Some(e);
                report.sink_failures = report.sink_failures.saturating_add(1);
                false
            }
        }
    }
}

/// Evaluates readings against per-channel bounds and logs periodically
#[derive(Debug, Clone)]
pub struct ThresholdAlertEngine {
    channels: Vec<ChannelAlertState, MAX_CHANNELS>,
    evaluation_timer: IntervalTimer,
    logging_timer: IntervalTimer,
    sink_status: SinkStatus,
}

impl ThresholdAlertEngine {
    pub fn new(evaluation_interval_ms: u32, log_interval_ms: u32, now_ms: u32) -> Self {
        Self {
            channels: Vec::new(),
            evaluation_timer: IntervalTimer::new(evaluation_interval_ms, now_ms),
            logging_timer: IntervalTimer::new(log_interval_ms, now_ms),
            sink_status: SinkStatus::default(),
        }
    }

    pub fn add_channel(&mut self, spec: ChannelSpec, warning_interval_ms: u32, now_ms: u32) -> Result<(), Error> {
        self.channels
            .push(ChannelAlertState::new(spec, warning_interval_ms, now_ms))
            .map_err(|_| Error::CapacityExceeded)
    }

    pub fn channels(&self) -> &[ChannelAlertState] {
        &self.channels
    }

    pub fn channel(&self, label: &str) -> Option<&ChannelAlertState> {
        self.channels.iter().find(|c| c.label() == label)
    }

    pub fn sink_status(&self) -> SinkStatus {
        self.sink_status
    }

    /// Attach channels to sensors of the current device set
    ///
    /// A channel keeps its sensor while that address is present. An unbound
    /// channel, or one whose sensor left the bus, takes the device at its
    /// `sensor_index` if no other channel holds it, otherwise the first
    /// unclaimed device. With nothing unclaimed it keeps its old address and
    /// resumes if that sensor comes back.
    pub fn bind(&mut self, devices: &DeviceSet) {
        let mut claimed: Vec<DeviceAddress, MAX_CHANNELS> = self
            .channels
            .iter()
            .filter_map(|c| c.sensor)
            .filter(|a| devices.contains(a))
            .collect();

        for channel in self.channels.iter_mut() {
            if channel.sensor.is_some_and(|a| devices.contains(&a)) {
                continue;
            }
            let preferred = devices
                .get(channel.spec.sensor_index)
                .filter(|a| !claimed.contains(*a));
            let Some(address) = preferred
                .or_else(|| devices.iter().find(|a| !claimed.contains(*a)))
                .copied()
            else {
                continue;
            };
            info!("Channel {} bound to sensor {}", channel.spec.label, address);
            channel.sensor = Some(address);
            channel.last_value = None;
            // Capacity matches the channel count
            let _ = claimed.push(address);
        }
    }

    /// Take the latest readings, matched to channels by sensor address
    ///
    /// A channel whose sensor is missing or whose reading is invalid has no
    /// current value and is skipped until a valid reading arrives.
    pub fn ingest(&mut self, readings: &[Reading]) {
        for channel in self.channels.iter_mut() {
            channel.last_value = channel.sensor.and_then(|address| {
                readings
                    .iter()
                    .find(|r| r.address == address)
                    .and_then(Reading::value)
            });
        }
    }

    /// Run whichever of evaluation and logging are due
    pub fn tick<N: Notifier>(&mut self, sink: &mut N, now_ms: u32) -> EngineReport {
        let mut report = EngineReport::default();

        if self.evaluation_timer.poll(now_ms) {
            report.evaluated = true;
            for channel in self.channels.iter_mut() {
                let Some(value) = channel.last_value else {
                    continue;
                };
                let Some(alert) = channel.evaluate(value, now_ms) else {
                    continue;
                };
                warn!(
                    "Channel {} {}: {} (bound {}, off by {})",
                    alert.channel,
                    alert.excursion,
                    alert.value,
                    alert.bound,
                    alert.magnitude()
                );
                if self.sink_status.record(sink.send_alert(&alert), &mut report) {
                    report.alerts_sent += 1;
                }
            }
        }

        if self.logging_timer.poll(now_ms) {
            let samples: Vec<Sample<'static>, MAX_CHANNELS> = self
                .channels
                .iter()
                .filter_map(|c| {
                    c.last_value.map(|value| Sample {
                        channel: c.label(),
                        value,
                    })
                })
                .collect();
            if samples.is_empty() {
                debug!("Logging an empty data point: no valid readings");
            }
            if self.sink_status.record(sink.send_log(&samples), &mut report) {
                report.logged = true;
            }
        }

        report
    }
}
