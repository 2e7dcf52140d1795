//! `From` implementations bridging `spc_config` types to `spc_core` types.
//!
//! Limits are taken as validated: `Config::validate()` has already rejected
//! `ucl < lcl`. A config that skipped validation falls back to the device
//! kind's preset limits rather than panicking.

use std::time::Duration;

use crate::config::{Limits, MonitorSettings, SensorSettings};

// ── SensorSettings ───────────────────────────────────────────────────────────

/// Sensor settings for one `[[device]]`, with the shared sampling and
/// logging sections applied.
pub fn sensor_settings(cfg: &spc_config::Config, device: &spc_config::DeviceCfg) -> SensorSettings {
    let mut s = SensorSettings::from(device);
    s.period = Duration::from_millis(cfg.sampling.period_ms.max(1));
    s.log_capacity = cfg.logging.buffer_capacity;
    s
}

impl From<&spc_config::DeviceCfg> for SensorSettings {
    fn from(d: &spc_config::DeviceCfg) -> Self {
        let preset = d.kind.preset();
        let limits = Limits::new(d.ucl(), d.lcl())
            .or_else(|_| Limits::new(preset.ucl, preset.lcl))
            .unwrap_or(Limits::UNBOUNDED);
        Self {
            limits,
            verbose: d.verbose,
            ..SensorSettings::default()
        }
    }
}

// ── MonitorSettings ──────────────────────────────────────────────────────────

impl From<&spc_config::Monitor> for MonitorSettings {
    fn from(m: &spc_config::Monitor) -> Self {
        Self {
            interval: Duration::from_millis(m.interval_ms.max(1)),
            window: m.window.as_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spc_config::{Config, DeviceCfg, DeviceKind, TimeWindow};

    #[test]
    fn device_preset_limits_flow_through() {
        let d = DeviceCfg::of_kind(DeviceKind::Pressure);
        let s = SensorSettings::from(&d);
        assert_eq!((s.limits.ucl(), s.limits.lcl()), (6.5, 3.5));
        assert!(!s.verbose);
    }

    #[test]
    fn shared_sections_apply() {
        let mut cfg = Config::default();
        cfg.sampling.period_ms = 250;
        cfg.logging.buffer_capacity = 42;
        let device = cfg.devices[0].clone();
        let s = sensor_settings(&cfg, &device);
        assert_eq!(s.period, Duration::from_millis(250));
        assert_eq!(s.log_capacity, 42);
    }

    #[test]
    fn inverted_limits_fall_back_to_the_kind_preset() {
        let mut d = DeviceCfg::of_kind(DeviceKind::Temperature);
        d.ucl = Some(1.0);
        d.lcl = Some(2.0);
        let s = SensorSettings::from(&d);
        assert_eq!((s.limits.ucl(), s.limits.lcl()), (60.0, 40.0));
    }

    #[test]
    fn each_kind_keeps_its_own_limits() {
        let got: Vec<_> = DeviceKind::ALL
            .into_iter()
            .map(|k| SensorSettings::from(&DeviceCfg::of_kind(k)).limits)
            .map(|l| (l.ucl(), l.lcl()))
            .collect();
        assert_eq!(got, [(60.0, 40.0), (6.5, 3.5), (0.3, 0.1)]);
    }

    #[test]
    fn monitor_window_maps_to_duration() {
        let m = spc_config::Monitor {
            window: TimeWindow::FiveMinutes,
            ..Default::default()
        };
        let s = MonitorSettings::from(&m);
        assert_eq!(s.window, Duration::from_secs(300));
        assert_eq!(s.interval, Duration::from_millis(2000));
    }
}
