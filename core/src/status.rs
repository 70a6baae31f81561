//! Status LED cadences and node health
//!
//! The LED is the only health signal available without a log console, so
//! each fault class gets its own blink cadence. Blinking is asymmetric: the
//! timer is re-armed with the on or off duration at every toggle.

use embedded_hal::digital::OutputPin;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::timer::IntervalTimer;

/// On/off durations of one blink cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct BlinkPattern {
    pub on_ms: u32,
    pub off_ms: u32,
}

impl BlinkPattern {
    /// Short blip every two seconds
    pub const HEALTHY: Self = Self::new(100, 1_900);
    /// Slow even blink
    pub const SENSOR_FAULT: Self = Self::new(500, 500);
    /// Fast flicker
    pub const SINK_FAULT: Self = Self::new(100, 300);
    /// Very slow even blink
    pub const NO_SENSORS: Self = Self::new(1_000, 1_000);

    pub const fn new(on_ms: u32, off_ms: u32) -> Self {
        Self { on_ms, off_ms }
    }
}

/// Coarse node health, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Health {
    Healthy,
    NoSensors,
    SinkFault,
    SensorFault,
}

/// Consecutive-failure counters feeding [`Health`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthTracker {
    sensor_failures: u8,
    sink_failures: u8,
    device_count: u8,
    threshold: u8,
}

impl HealthTracker {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.max(1),
            ..Default::default()
        }
    }

    /// Record a measurement cycle; one fully valid cycle clears the count
    pub fn record_cycle(&mut self, failures: u8) {
        if failures == 0 {
            self.sensor_failures = 0;
        } else {
            self.sensor_failures = self.sensor_failures.saturating_add(1);
        }
    }

    pub fn record_sink(&mut self, ok: bool) {
        if ok {
            self.sink_failures = 0;
        } else {
            self.sink_failures = self.sink_failures.saturating_add(1);
        }
    }

    pub fn set_device_count(&mut self, count: u8) {
        self.device_count = count;
    }

    pub fn health(&self) -> Health {
        if self.sensor_failures >= self.threshold {
            Health::SensorFault
        } else if self.sink_failures >= self.threshold {
            Health::SinkFault
        } else if self.device_count == 0 {
            Health::NoSensors
        } else {
            Health::Healthy
        }
    }
}

/// Drives the status LED through a [`BlinkPattern`]
pub struct StatusIndicator<L> {
    led: L,
    active_low: bool,
    lit: bool,
    pattern: BlinkPattern,
    timer: IntervalTimer,
}

impl<L: OutputPin> StatusIndicator<L> {
    /// Starts lit, with the first toggle after `pattern.on_ms`
    pub fn new(led: L, active_low: bool, pattern: BlinkPattern, now_ms: u32) -> Self {
        let mut indicator = Self {
            led,
            active_low,
            lit: false,
            pattern,
            timer: IntervalTimer::new(pattern.on_ms, now_ms),
        };
        indicator.drive(true);
        indicator
    }

    pub fn pattern(&self) -> BlinkPattern {
        self.pattern
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Switch cadence; takes effect at the next toggle
    pub fn set_pattern(&mut self, pattern: BlinkPattern) {
        if pattern != self.pattern {
            debug!("Status pattern {} -> {}", self.pattern, pattern);
            self.pattern = pattern;
        }
    }

    /// Toggle the LED if the current phase has elapsed
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if !self.timer.poll(now_ms) {
            return false;
        }
        let lit = !self.lit;
        let next = if lit {
            self.pattern.on_ms
        } else {
            self.pattern.off_ms
        };
        self.drive(lit);
        self.timer.reset(now_ms, Some(next));
        true
    }

    pub fn release(self) -> L {
        self.led
    }

    fn drive(&mut self, lit: bool) {
        let high = lit != self.active_low;
        let result = if high {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
        if result.is_err() {
            warn!("Status LED write failed");
        }
        self.lit = lit;
    }
}
