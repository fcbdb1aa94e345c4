use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::Actuator;
use crate::policy::DutyValue;

/// Manual duty control mode for hwmon `pwmN_enable`.
const PWM_MODE_MANUAL: &str = "1";

/// A Linux hwmon PWM attribute (`pwmN`, 0–255).
#[derive(Debug)]
pub struct SysfsFan {
    pwm_path: PathBuf,
}

impl SysfsFan {
    /// Switches the channel to manual mode when the driver has an
    /// `_enable` attribute, then starts the fan at duty 0.
    pub fn open(pwm_path: impl Into<PathBuf>) -> Result<Self, String> {
        let pwm_path = pwm_path.into();

        let enable_path = enable_path_for(&pwm_path);
        if enable_path.exists() {
            write_attr(&enable_path, PWM_MODE_MANUAL).map_err(|e| {
                format!("Failed to enable manual PWM at {}: {e}", enable_path.display())
            })?;
        }

        write_duty(&pwm_path, DutyValue::OFF)
            .map_err(|e| format!("Failed to initialise fan at {}: {e}", pwm_path.display()))?;

        info!("Fan channel ready at {}", pwm_path.display());
        Ok(Self { pwm_path })
    }
}

impl Actuator for SysfsFan {
    fn apply(&mut self, duty: DutyValue) {
        if let Err(e) = write_duty(&self.pwm_path, duty) {
            warn!("Failed to set fan duty {} at {}: {}", duty.0, self.pwm_path.display(), e);
        }
    }
}

fn write_duty(path: &Path, duty: DutyValue) -> std::io::Result<()> {
    write_attr(path, &duty.0.to_string())
}

/// Never creates the attribute: a missing channel must fail, not silently
/// become a plain file.
fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)?
        .write_all(value.as_bytes())
}

/// "pwm1" → "pwm1_enable"
fn enable_path_for(pwm_path: &Path) -> PathBuf {
    let mut name = pwm_path.file_name().unwrap_or_default().to_os_string();
    name.push("_enable");
    pwm_path.with_file_name(name)
}
