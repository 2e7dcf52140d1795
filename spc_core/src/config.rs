//! Runtime settings for sensors and the monitor.
//!
//! These are separate from the TOML-deserialized config in `spc_config`.
use std::time::Duration;

use crate::error::CommandError;
use crate::log::LogRing;

/// Upper/lower control limits. Always finite with `ucl >= lcl`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    ucl: f64,
    lcl: f64,
}

impl Limits {
    /// Limits no finite value violates; used until real limits are set.
    pub const UNBOUNDED: Limits = Limits {
        ucl: f64::MAX,
        lcl: f64::MIN,
    };

    pub fn new(ucl: f64, lcl: f64) -> Result<Self, CommandError> {
        if !ucl.is_finite() || !lcl.is_finite() || ucl < lcl {
            return Err(CommandError::InvalidLimits { ucl, lcl });
        }
        Ok(Self { ucl, lcl })
    }

    pub fn ucl(&self) -> f64 {
        self.ucl
    }

    pub fn lcl(&self) -> f64 {
        self.lcl
    }

    /// True when `value` lies strictly outside `[lcl, ucl]`.
    #[inline]
    pub fn violated_by(&self, value: f64) -> bool {
        value > self.ucl || value < self.lcl
    }
}

/// Per-sensor settings.
#[derive(Debug, Clone)]
pub struct SensorSettings {
    pub limits: Limits,
    /// Poll period of the sampling loop. Default: 1 s.
    pub period: Duration,
    /// Start with per-measurement log entries enabled.
    pub verbose: bool,
    /// Entries kept in the operator log ring.
    pub log_capacity: usize,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            limits: Limits::UNBOUNDED,
            period: Duration::from_millis(1000),
            verbose: false,
            log_capacity: LogRing::DEFAULT_CAPACITY,
        }
    }
}

/// Settings of the background SPC monitor.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Time between evaluation cycles. Default: 2 s.
    pub interval: Duration,
    /// Look-back window queried per sensor and cycle. Default: 1 h.
    pub window: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            window: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(50.0, 10.0, true)]
    #[case(10.0, 10.0, true)]
    #[case(10.0, 50.0, false)]
    #[case(f64::NAN, 0.0, false)]
    #[case(f64::INFINITY, 0.0, false)]
    #[case(1.0, f64::NEG_INFINITY, false)]
    fn limits_validation(#[case] ucl: f64, #[case] lcl: f64, #[case] ok: bool) {
        assert_eq!(Limits::new(ucl, lcl).is_ok(), ok);
    }

    #[test]
    fn violation_is_strict() {
        let l = Limits::new(50.0, 10.0).unwrap();
        assert!(!l.violated_by(50.0));
        assert!(!l.violated_by(10.0));
        assert!(l.violated_by(50.01));
        assert!(l.violated_by(9.99));
    }

    #[test]
    fn default_limits_flag_no_finite_value() {
        let l = SensorSettings::default().limits;
        for v in [f64::MAX, f64::MIN, 0.0, 1e300, -1e300] {
            assert!(!l.violated_by(v), "{v}");
        }
    }
}
