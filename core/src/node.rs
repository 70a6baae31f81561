//! The node scheduler
//!
//! [`Node`] owns every component and the hardware capabilities. The board
//! calls [`Node::tick`] from its main loop with a free-running millisecond
//! clock; each tick polls the timers in a fixed order:
//!
//! 1. status LED
//! 2. bus reconciliation
//! 3. measurement (read-result phase, then issue-conversion phase)
//! 4. threshold evaluation and data logging
//! 5. heartbeat
//!
//! Nothing in a tick blocks; the longest step is one bus transaction per
//! sensor.

use embedded_hal::digital::OutputPin;
use thermonode_hal::{BlobStore, Notifier, OneWireBus};

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::alert::{EngineReport, ThresholdAlertEngine};
use crate::config::{self, NodeConfig};
use crate::error::Error;
use crate::reconcile::{DeviceSetReconciler, Reconciliation};
use crate::sensor::{MeasurementCycle, Phase, Readings};
use crate::settings::NodeSettings;
use crate::status::{BlinkPattern, Health, HealthTracker, StatusIndicator};
use crate::timer::IntervalTimer;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct TickReport {
    pub reconciled: Option<Reconciliation>,
    pub conversions_started: u8,
    pub readings_completed: bool,
    pub engine: EngineReport,
    pub heartbeat_sent: bool,
}

/// A temperature node: sensors, alerting and status on one cooperative loop
pub struct Node<B, N, L> {
    bus: B,
    notifier: N,
    status: StatusIndicator<L>,
    config: NodeConfig,
    settings: NodeSettings,
    health: HealthTracker,
    reconcile_timer: IntervalTimer,
    poll_timer: IntervalTimer,
    heartbeat_timer: IntervalTimer,
    measurement: MeasurementCycle,
    engine: ThresholdAlertEngine,
    readings: Readings,
    config_dirty: bool,
    /// Set after a failed config write; gates the next attempt
    persist_retry: Option<IntervalTimer>,
    last_error: Option<Error>,
}

impl<B, N, L> Node<B, N, L>
where
    B: OneWireBus,
    N: Notifier,
    L: OutputPin,
{
    /// Build a node at `now_ms`
    ///
    /// Reconciliation, the first measurement and the first heartbeat are
    /// due on the first tick.
    pub fn new(bus: B, notifier: N, led: L, config: NodeConfig, settings: NodeSettings, now_ms: u32) -> Self {
        let mut engine = ThresholdAlertEngine::new(
            settings.evaluation_interval_ms,
            settings.log_interval_ms,
            now_ms,
        );
        for spec in settings.channels.iter() {
            if engine
                .add_channel(*spec, config.error_interval_ms, now_ms)
                .is_err()
            {
                warn!("Alert channel {} dropped: capacity exceeded", spec.label);
            }
        }
        // The stored set is in last scan order, so channels pick up the
        // sensors they had before the reboot
        engine.bind(&config.devices);

        let mut health = HealthTracker::new(settings.fault_threshold);
        health.set_device_count(config.devices.len() as u8);

        info!(
            "Node starting: {} known sensor(s), poll {} ms, re-alert {} ms",
            config.devices.len(),
            config.poll_interval_ms,
            config.error_interval_ms
        );

        Self {
            bus,
            notifier,
            status: StatusIndicator::new(
                led,
                settings.led_active_low,
                settings.healthy_blink,
                now_ms,
            ),
            health,
            reconcile_timer: IntervalTimer::new_due(settings.reconcile_interval_ms, now_ms),
            poll_timer: IntervalTimer::new_due(config.poll_interval_ms, now_ms),
            heartbeat_timer: IntervalTimer::new_due(settings.heartbeat_interval_ms, now_ms),
            measurement: MeasurementCycle::new(settings.conversion_ms, settings.units, now_ms),
            engine,
            readings: Readings::new(),
            config_dirty: false,
            persist_retry: None,
            last_error: None,
            config,
            settings,
        }
    }

    /// Run every activity that is due at `now_ms`
    pub fn tick(&mut self, now_ms: u32) -> TickReport {
        let mut report = TickReport::default();

        let pattern = self.pattern_for(self.health.health());
        self.status.set_pattern(pattern);
        self.status.poll(now_ms);

        if self.reconcile_timer.poll(now_ms) {
            report.reconciled = self.reconcile();
        }

        if let Some(cycle) = self.measurement.complete(&mut self.bus, now_ms) {
            report.readings_completed = true;
            if let Some(e) = cycle.last_error {
                self.last_error = Some(e);
            }
            self.health.record_cycle(cycle.failures);
            self.engine.ingest(&cycle.readings);
            debug!(
                "Measurement cycle done: {}/{} valid",
                cycle.valid_count(),
                cycle.readings.len()
            );
            self.readings = cycle.readings;
        }
        if self.poll_timer.poll(now_ms) {
            let started = self
                .measurement
                .begin(&mut self.bus, &self.config.devices, now_ms);
            report.conversions_started = started as u8;
        }

        report.engine = self.engine.tick(&mut self.notifier, now_ms);
        if report.engine.sink_used() {
            self.health.record_sink(report.engine.sink_failures == 0);
        }
        if report.engine.sink_failures != 0 {
            self.last_error = Some(Error::SinkUnavailable);
        }

        if self.heartbeat_timer.poll(now_ms) {
            let count = self.config.devices.len() as u8;
            match self.notifier.send_heartbeat(&self.config.guid, count) {
                Ok(()) => {
                    report.heartbeat_sent = true;
                    self.health.record_sink(true);
                }
                Err(e) => {
                    warn!("Heartbeat failed: {}", e);
                    self.last_error = Some(Error::SinkUnavailable);
                    self.health.record_sink(false);
                }
            }
        }

        report
    }

    fn reconcile(&mut self) -> Option<Reconciliation> {
        match DeviceSetReconciler::reconcile(&mut self.bus, &mut self.config.devices) {
            Ok(outcome) => {
                let devices = &self.config.devices;
                if outcome.changed() {
                    self.config_dirty = true;
                    self.readings.retain(|r| devices.contains(&r.address));
                }
                self.engine.bind(devices);
                self.engine.ingest(&self.readings);
                self.health.set_device_count(devices.len() as u8);
                Some(outcome)
            }
            Err(e) => {
                warn!("Reconciliation failed: {}", e);
                self.last_error = Some(e);
                self.health.record_cycle(1);
                None
            }
        }
    }

    fn pattern_for(&self, health: Health) -> BlinkPattern {
        match health {
            Health::Healthy => self.settings.healthy_blink,
            Health::NoSensors => self.settings.no_sensors_blink,
            Health::SinkFault => self.settings.sink_fault_blink,
            Health::SensorFault => self.settings.sensor_fault_blink,
        }
    }

    /// Write the config to `store` if the device set changed since the last
    /// successful write. Returns whether a write happened.
    ///
    /// The config stays dirty until a write succeeds. After a failure the
    /// next attempt waits one reconcile interval.
    pub fn persist<S: BlobStore>(&mut self, store: &mut S, now_ms: u32) -> Result<bool, Error> {
        if !self.config_dirty {
            return Ok(false);
        }
        if let Some(retry) = self.persist_retry.as_mut() {
            if !retry.poll(now_ms) {
                return Ok(false);
            }
        }
        match config::save(store, &self.config) {
            Ok(()) => {
                info!("Config saved ({} sensor(s))", self.config.devices.len());
                self.config_dirty = false;
                self.persist_retry = None;
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Config save failed, retrying in {} ms",
                    self.settings.reconcile_interval_ms
                );
                self.persist_retry = Some(IntervalTimer::new(
                    self.settings.reconcile_interval_ms,
                    now_ms,
                ));
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn engine(&self) -> &ThresholdAlertEngine {
        &self.engine
    }

    /// Readings of the last completed measurement cycle
    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn health(&self) -> Health {
        self.health.health()
    }

    pub fn measurement_phase(&self) -> Phase {
        self.measurement.phase()
    }

    pub fn status(&self) -> &StatusIndicator<L> {
        &self.status
    }

    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }
}
