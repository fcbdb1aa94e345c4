use std::path::PathBuf;

use tracing::debug;

use super::{Reading, SensorFault, SensorReader, TemperatureReading};

/// Operating range of the AM2301 the rack is fitted with.
const MIN_CELSIUS: f32 = -40.0;
const MAX_CELSIUS: f32 = 80.0;

/// Reads a Linux hwmon temperature attribute (millidegrees Celsius), plus an
/// optional humidity attribute (milli-percent).
pub struct HwmonSensor {
    temp_path: PathBuf,
    humidity_path: Option<PathBuf>,
}

impl HwmonSensor {
    pub fn new(temp_path: impl Into<PathBuf>, humidity_path: Option<PathBuf>) -> Self {
        Self {
            temp_path: temp_path.into(),
            humidity_path,
        }
    }

    fn read_celsius(&self) -> Result<f32, SensorFault> {
        let raw = std::fs::read_to_string(&self.temp_path)
            .map_err(|e| SensorFault::Io(format!("{}: {e}", self.temp_path.display())))?;
        let celsius = parse_milli(&raw).ok_or_else(|| SensorFault::Malformed(raw.trim().into()))?;
        if !celsius.is_finite() || !(MIN_CELSIUS..=MAX_CELSIUS).contains(&celsius) {
            return Err(SensorFault::OutOfRange(celsius));
        }
        Ok(celsius)
    }

    /// Humidity is informational; a failed read never invalidates the temperature.
    fn read_humidity(&self) -> Option<f32> {
        let path = self.humidity_path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(raw) => parse_milli(&raw),
            Err(e) => {
                debug!("Humidity read from {} failed: {}", path.display(), e);
                None
            }
        }
    }
}

impl SensorReader for HwmonSensor {
    fn read(&mut self) -> TemperatureReading {
        match self.read_celsius() {
            Ok(celsius) => TemperatureReading::Valid(Reading {
                celsius,
                humidity: self.read_humidity(),
            }),
            Err(fault) => TemperatureReading::Invalid(fault),
        }
    }
}

/// "23400\n" → 23.4
fn parse_milli(raw: &str) -> Option<f32> {
    raw.trim().parse::<i64>().ok().map(|v| v as f32 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "serverrack-fan-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_millidegrees() {
        let path = temp_file("temp-ok", "23400\n");
        let mut sensor = HwmonSensor::new(&path, None);
        assert_eq!(
            sensor.read(),
            TemperatureReading::Valid(Reading {
                celsius: 23.4,
                humidity: None
            })
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reads_optional_humidity() {
        let temp = temp_file("temp-hum", "26500");
        let hum = temp_file("hum-ok", "41250\n");
        let mut sensor = HwmonSensor::new(&temp, Some(hum.clone()));
        match sensor.read() {
            TemperatureReading::Valid(r) => {
                assert_eq!(r.celsius, 26.5);
                assert_eq!(r.humidity, Some(41.25));
            }
            other => panic!("unexpected {other:?}"),
        }
        std::fs::remove_file(&temp).unwrap();
        std::fs::remove_file(&hum).unwrap();
    }

    #[test]
    fn missing_humidity_keeps_temperature_valid() {
        let temp = temp_file("temp-nohum", "26000");
        let mut sensor = HwmonSensor::new(&temp, Some(PathBuf::from("/nonexistent/humidity1_input")));
        assert!(matches!(
            sensor.read(),
            TemperatureReading::Valid(Reading { humidity: None, .. })
        ));
        std::fs::remove_file(&temp).unwrap();
    }

    #[test]
    fn missing_file_is_invalid() {
        let mut sensor = HwmonSensor::new("/nonexistent/temp1_input", None);
        assert!(matches!(
            sensor.read(),
            TemperatureReading::Invalid(SensorFault::Io(_))
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let path = temp_file("temp-garbage", "nan\n");
        let mut sensor = HwmonSensor::new(&path, None);
        assert_eq!(
            sensor.read(),
            TemperatureReading::Invalid(SensorFault::Malformed("nan".into()))
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn out_of_range_is_invalid() {
        let path = temp_file("temp-range", "125000");
        let mut sensor = HwmonSensor::new(&path, None);
        assert_eq!(
            sensor.read(),
            TemperatureReading::Invalid(SensorFault::OutOfRange(125.0))
        );
        std::fs::remove_file(&path).unwrap();
    }
}
