//! Non-blocking interval timer
//!
//! The only scheduling primitive of the node: every periodic activity owns an
//! [`IntervalTimer`] and the main loop polls it with the current millisecond
//! clock. Elapsed time is computed with wrapping `u32` subtraction, so the
//! timer keeps working when the millisecond counter rolls over (~49.7 days).

#[cfg(feature = "defmt")]
use defmt::Format;

/// Periodic trigger polled against a free-running millisecond clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct IntervalTimer {
    delay_ms: u32,
    last_fire_ms: u32,
}

impl IntervalTimer {
    /// Create a timer whose first firing is `delay_ms` after `now_ms`
    ///
    /// A zero delay never fires until a delay is configured.
    pub const fn new(delay_ms: u32, now_ms: u32) -> Self {
        Self {
            delay_ms,
            last_fire_ms: now_ms,
        }
    }

    /// Create a timer that is already due at `now_ms`
    pub const fn new_due(delay_ms: u32, now_ms: u32) -> Self {
        Self {
            delay_ms,
            last_fire_ms: now_ms.wrapping_sub(delay_ms),
        }
    }

    /// Restart the interval at `now_ms`, optionally switching to a new delay
    pub fn reset(&mut self, now_ms: u32, delay_ms: Option<u32>) {
        if let Some(delay_ms) = delay_ms {
            self.delay_ms = delay_ms;
        }
        self.last_fire_ms = now_ms;
    }

    /// Change the period without moving the reference time
    ///
    /// A shortened delay may fire on the very next poll.
    pub fn set_delay(&mut self, delay_ms: u32) {
        self.delay_ms = delay_ms;
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Returns `true` and re-arms at `now_ms` once `delay_ms` has elapsed
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.delay_ms == 0 {
            return false;
        }
        if now_ms.wrapping_sub(self.last_fire_ms) >= self.delay_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Milliseconds left until the next firing (0 if due)
    pub fn remaining_ms(&self, now_ms: u32) -> u32 {
        self.delay_ms
            .saturating_sub(now_ms.wrapping_sub(self.last_fire_ms))
    }
}
