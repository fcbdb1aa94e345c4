pub mod hwmon;

use std::fmt;

/// A validated acquisition from the rack sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub celsius: f32,
    /// Relative humidity in percent, when the sensor exposes it.
    pub humidity: Option<f32>,
}

/// Why an acquisition was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorFault {
    Io(String),
    Malformed(String),
    OutOfRange(f32),
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorFault::Io(e) => write!(f, "read failed: {e}"),
            SensorFault::Malformed(raw) => write!(f, "malformed value '{raw}'"),
            SensorFault::OutOfRange(c) => write!(f, "{c}°C is outside the sensor range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureReading {
    Valid(Reading),
    Invalid(SensorFault),
}

/// One blocking acquisition per call. Implementations must not retry;
/// the control loop skips the tick instead.
pub trait SensorReader {
    fn read(&mut self) -> TemperatureReading;
}
