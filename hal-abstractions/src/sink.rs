//! Notification / data-logging sink capability
//!
//! Transport (HTTP, WebSocket, MQTT, RTT) is the implementor's concern. The
//! core only needs to know whether a call succeeded.

#[cfg(feature = "defmt")]
use defmt::Format;

/// Direction of a threshold excursion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Excursion {
    TooCold,
    TooHot,
}

/// One threshold alert
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct AlertMessage<'a> {
    /// Channel label, e.g. "warm"
    pub channel: &'a str,
    /// Measured value in the node's configured units
    pub value: f32,
    /// The bound that was crossed
    pub bound: f32,
    pub excursion: Excursion,
}

impl AlertMessage<'_> {
    /// Distance past the violated bound (always positive)
    pub fn magnitude(&self) -> f32 {
        match self.excursion {
            Excursion::TooCold => self.bound - self.value,
            Excursion::TooHot => self.value - self.bound,
        }
    }
}

/// One labelled value of a periodic log data point
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Sample<'a> {
    pub channel: &'a str,
    pub value: f32,
}

/// Sink call failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum SinkError {
    /// Transport not reachable (no link, connect refused, timeout)
    Unavailable,
    /// Remote end answered with a non-success status code
    Rejected(u16),
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Sink unavailable"),
            Self::Rejected(status) => write!(f, "Sink rejected request (status {})", status),
        }
    }
}

impl core::error::Error for SinkError {}

/// Outbound notifications and data points
pub trait Notifier {
    fn send_alert(&mut self, alert: &AlertMessage<'_>) -> Result<(), SinkError>;

    fn send_log(&mut self, samples: &[Sample<'_>]) -> Result<(), SinkError>;

    /// Periodic liveness message
    fn send_heartbeat(&mut self, guid: &[u8; 8], device_count: u8) -> Result<(), SinkError>;
}
