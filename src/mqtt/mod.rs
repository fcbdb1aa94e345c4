pub mod client;

use crate::policy::DutyPercent;
use crate::sensor::Reading;

pub const TEMPERATURE_TOPIC: &str = "sensors/serverrack/temperature";
pub const FAN_SPEED_TOPIC: &str = "sensors/serverrack/fanspeed";

/// One metric, ready to hand to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub topic: &'static str,
    pub payload: String,
}

/// Emits the temperature and fan-speed metrics together, fire-and-forget.
/// Only valid readings can be published.
pub trait TelemetryPublisher {
    fn publish(&mut self, reading: &Reading, duty: DutyPercent);
}

/// Temperature as one-decimal °C, fan speed as an integer percent.
pub fn telemetry_messages(reading: &Reading, duty: DutyPercent) -> [TelemetryMessage; 2] {
    [
        TelemetryMessage {
            topic: TEMPERATURE_TOPIC,
            payload: format!("{:.1}", reading.celsius),
        },
        TelemetryMessage {
            topic: FAN_SPEED_TOPIC,
            payload: duty.to_string(),
        },
    ]
}
