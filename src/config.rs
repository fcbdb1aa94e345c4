use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::policy::DutyPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub sensor: SensorConfig,
    pub fan: FanConfig,
    pub control: ControlConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// hwmon temperature attribute, millidegrees Celsius.
    pub temp_path: PathBuf,
    /// Optional hwmon humidity attribute, milli-percent. Logged only.
    pub humidity_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FanConfig {
    /// hwmon PWM attribute, 0–255.
    pub pwm_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub tick_period_secs: u64,
    pub policy: DutyPolicy,
    /// Consecutive sensor faults before forcing full speed. 0 disables.
    pub sensor_fault_limit: u32,
}

impl ControlConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }
}

/// Reads configuration values by key; `None` when unset.
struct Source<F>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn required(&self, key: &str) -> Result<String, String> {
        self.optional(key)
            .ok_or_else(|| format!("{key} environment variable is required"))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Unlike a bare fallback, a value that is set but unparseable is an error.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(v) => v.parse().map_err(|e| format!("{key}: invalid value '{v}': {e}")),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let src = Source(lookup);

        let config = Self {
            mqtt: MqttConfig {
                broker_host: src.required("MQTT_BROKER_HOST")?,
                broker_port: src.parsed_or("MQTT_BROKER_PORT", 1883)?,
                username: src.optional("MQTT_USERNAME"),
                password: src.optional("MQTT_PASSWORD"),
                client_id: src.or_default("MQTT_CLIENT_ID", "serverrack-fan"),
            },
            sensor: SensorConfig {
                temp_path: src
                    .or_default("SENSOR_PATH", "/sys/class/hwmon/hwmon0/temp1_input")
                    .into(),
                humidity_path: src.optional("HUMIDITY_PATH").map(PathBuf::from),
            },
            fan: FanConfig {
                pwm_path: src
                    .or_default("FAN_PWM_PATH", "/sys/class/hwmon/hwmon0/pwm1")
                    .into(),
            },
            control: ControlConfig {
                tick_period_secs: src.parsed_or("TICK_PERIOD_SECS", 300)?,
                policy: src.parsed_or("FAN_POLICY", DutyPolicy::Stepped)?,
                sensor_fault_limit: src.parsed_or("SENSOR_FAULT_LIMIT", 0)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.trim().is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.control.tick_period_secs == 0 {
            return Err("TICK_PERIOD_SECS must be > 0".into());
        }
        Ok(())
    }
}
