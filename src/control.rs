//! The periodic thermal-control loop.
//!
//! Each tick runs sensor → policy → actuator → telemetry in order. A failed
//! sensor read skips the tick: the fan holds its last duty, nothing is
//! published, and [`LoopState`] is left untouched.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

use crate::fan::Actuator;
use crate::mqtt::TelemetryPublisher;
use crate::policy::{DutyPolicy, DutyValue, to_percent};
use crate::sensor::{SensorFault, SensorReader, TemperatureReading};

/// Carried from one successful tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopState {
    pub last_celsius: f32,
    pub last_duty: DutyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Applied { celsius: f32, duty: DutyValue },
    /// Nothing changed; the fan keeps running at `holding`.
    Skipped { fault: SensorFault, holding: DutyValue },
    /// The consecutive-fault limit was reached and the fan forced to full speed.
    FailSafe(SensorFault),
}

pub struct ControlLoop<S, A, P> {
    sensor: S,
    fan: A,
    publisher: P,
    policy: DutyPolicy,
    state: LoopState,
    /// Last duty written to the fan, including a fail-safe override.
    commanded: DutyValue,
    fault_limit: u32,
    consecutive_faults: u32,
}

impl<S, A, P> ControlLoop<S, A, P>
where
    S: SensorReader,
    A: Actuator,
    P: TelemetryPublisher,
{
    pub fn new(sensor: S, fan: A, publisher: P, policy: DutyPolicy) -> Self {
        Self {
            sensor,
            fan,
            publisher,
            policy,
            state: LoopState::default(),
            commanded: DutyValue::OFF,
            fault_limit: 0,
            consecutive_faults: 0,
        }
    }

    /// After `limit` consecutive sensor faults, drive the fan to full speed
    /// once. Zero (the default) never intervenes.
    pub fn with_fault_limit(mut self, limit: u32) -> Self {
        self.fault_limit = limit;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tick(&mut self) -> TickOutcome {
        let reading = match self.sensor.read() {
            TemperatureReading::Valid(reading) => reading,
            TemperatureReading::Invalid(fault) => return self.on_fault(fault),
        };
        self.consecutive_faults = 0;

        match reading.humidity {
            Some(humidity) => info!("Temp: {:.1}°C | Humidity: {:.1}%", reading.celsius, humidity),
            None => info!("Temp: {:.1}°C", reading.celsius),
        }

        let duty = self.policy.duty(reading.celsius, self.state.last_celsius);
        self.fan.apply(duty);
        self.commanded = duty;

        let percent = to_percent(duty);
        info!("Duty: {} | {}%", duty.0, percent);
        self.publisher.publish(&reading, percent);

        self.state = LoopState {
            last_celsius: reading.celsius,
            last_duty: duty,
        };
        TickOutcome::Applied {
            celsius: reading.celsius,
            duty,
        }
    }

    fn on_fault(&mut self, fault: SensorFault) -> TickOutcome {
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        if self.fault_limit > 0 && self.consecutive_faults == self.fault_limit {
            error!(
                "Sensor failed {} times in a row ({}), forcing fan to full speed",
                self.consecutive_faults, fault
            );
            self.fan.apply(DutyValue::FULL);
            self.commanded = DutyValue::FULL;
            return TickOutcome::FailSafe(fault);
        }
        error!(
            "Failed to read sensor: {}. Holding duty {}",
            fault, self.commanded.0
        );
        TickOutcome::Skipped {
            fault,
            holding: self.commanded,
        }
    }

    /// Tick every `period` until `shutdown` resolves. The wait between ticks
    /// is the only suspension point and is cancelled by shutdown.
    pub async fn run(&mut self, period: Duration, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            self.tick();
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = &mut shutdown => {
                    info!("Control loop stopping");
                    return;
                }
            }
        }
    }
}
