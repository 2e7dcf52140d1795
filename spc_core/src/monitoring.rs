//! Statistical process-control checks over a batch of measurements.
//!
//! All checks are pure: they look only at the batch and the sensor snapshot
//! the service was built from.
use spc_traits::Measurement;

use crate::config::Limits;
use crate::sensor::SensorState;
use crate::util::display_ts;

#[derive(Debug, Clone)]
pub struct MonitoringService {
    name: String,
    state: SensorState,
    limits: Limits,
}

impl MonitoringService {
    pub fn new(name: impl Into<String>, state: SensorState, limits: Limits) -> Self {
        Self {
            name: name.into(),
            state,
            limits,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// One warning per measurement outside `[lcl, ucl]`, in input order.
    pub fn check_out_of_control(&self, measurements: &[Measurement]) -> Vec<String> {
        measurements
            .iter()
            .filter(|m| self.limits.violated_by(m.value))
            .map(|m| {
                format!(
                    "{}: Value {} at {} is out of control limits.",
                    self.name,
                    m.value,
                    display_ts(m.measured_at)
                )
            })
            .collect()
    }

    /// A single warning when a measuring sensor produced nothing in the window.
    pub fn check_device_failure(&self, measurements: &[Measurement]) -> Vec<String> {
        if measurements.is_empty() && self.state == SensorState::Measuring {
            vec![format!(
                "{}: No data detected while measuring. Possible device failure.",
                self.name
            )]
        } else {
            Vec::new()
        }
    }

    /// Device-failure warnings first, then out-of-control warnings.
    pub fn evaluate(&self, measurements: &[Measurement]) -> Vec<String> {
        let mut out = self.check_device_failure(measurements);
        out.extend(self.check_out_of_control(measurements));
        out
    }
}
