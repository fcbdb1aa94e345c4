use std::fmt;
use std::str::FromStr;

// Secure PWM range for the rack fan is roughly 50% - 100%.
pub const LOWER_BOUND_C: f32 = 25.0;
pub const UPPER_BOUND_C: f32 = 30.0;
pub const MIN_SPEED_PERCENT: u8 = 50;
pub const MAX_SPEED_PERCENT: u8 = 100;

/// A reading must fall this far below the previous one to step down a band.
pub const HYSTERESIS_C: f32 = 0.5;

/// Stepped bands as (upper edge in °C, percent), ascending. Anything at or
/// above the last edge runs at full speed.
const BANDS: [(f32, u8); 3] = [(27.0, 50), (30.0, 65), (32.0, 80)];

/// 8-bit actuator duty (0 = off, 255 = full speed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DutyValue(pub u8);

impl DutyValue {
    pub const OFF: Self = Self(0);
    pub const FULL: Self = Self(u8::MAX);
}

/// Percent projection of a [`DutyValue`], used for telemetry and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DutyPercent(u8);

impl DutyPercent {
    /// Clamps to 100.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DutyPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Percent to duty, rounding up so 100% is always exactly 255.
///
/// Not the exact inverse of [`to_percent`], which rounds down.
pub fn to_duty_value(percent: DutyPercent) -> DutyValue {
    let scaled = (u32::from(percent.get()) * 255).div_ceil(100);
    DutyValue(scaled as u8)
}

/// Duty to percent, rounding down. Lossy; for telemetry only.
pub fn to_percent(duty: DutyValue) -> DutyPercent {
    DutyPercent::new((u32::from(duty.0) * 100 / 255) as u8)
}

/// Maps a temperature to a fan duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyPolicy {
    /// Hysteresis bands; needs the previous reading.
    Stepped,
    /// Linear ramp between the lower and upper bound.
    Continuous,
}

impl DutyPolicy {
    /// `last_celsius` is ignored by the continuous strategy.
    pub fn duty(self, celsius: f32, last_celsius: f32) -> DutyValue {
        let percent = match self {
            DutyPolicy::Stepped => stepped_percent(celsius, last_celsius),
            DutyPolicy::Continuous => continuous_percent(celsius),
        };
        to_duty_value(percent)
    }
}

impl FromStr for DutyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stepped" => Ok(DutyPolicy::Stepped),
            "continuous" => Ok(DutyPolicy::Continuous),
            other => Err(format!(
                "unknown fan policy '{other}' (expected 'stepped' or 'continuous')"
            )),
        }
    }
}

impl fmt::Display for DutyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DutyPolicy::Stepped => f.write_str("stepped"),
            DutyPolicy::Continuous => f.write_str("continuous"),
        }
    }
}

/// First matching band wins. Rising is immediate; falling back into a band
/// requires the previous reading to have been inside it, or a drop of more
/// than [`HYSTERESIS_C`].
fn stepped_percent(celsius: f32, last_celsius: f32) -> DutyPercent {
    if celsius < LOWER_BOUND_C {
        return DutyPercent::new(0);
    }
    for (edge, percent) in BANDS {
        if celsius < edge && (last_celsius < edge || celsius < last_celsius - HYSTERESIS_C) {
            return DutyPercent::new(percent);
        }
    }
    DutyPercent::new(MAX_SPEED_PERCENT)
}

fn continuous_percent(celsius: f32) -> DutyPercent {
    if celsius < LOWER_BOUND_C {
        return DutyPercent::new(0);
    }
    if celsius >= UPPER_BOUND_C {
        return DutyPercent::new(MAX_SPEED_PERCENT);
    }
    // Integer millidegrees, so 25.3 °C ramps exactly like 25.300.
    let milli = to_milli(celsius);
    let lower = to_milli(LOWER_BOUND_C);
    let upper = to_milli(UPPER_BOUND_C);
    let span = i32::from(MAX_SPEED_PERCENT - MIN_SPEED_PERCENT);
    // Truncate toward zero, like an integer percent.
    let ramp = ((milli - lower).max(0) * span / (upper - lower)).min(span);
    DutyPercent::new(MIN_SPEED_PERCENT + ramp as u8)
}

fn to_milli(celsius: f32) -> i32 {
    (celsius * 1000.0).round() as i32
}
