pub mod sysfs;

use crate::policy::DutyValue;

/// Drives the fan channel. There is no error channel and no readback: the
/// hardware accepts any 8-bit duty, so range is the caller's concern.
pub trait Actuator {
    fn apply(&mut self, duty: DutyValue);
}
