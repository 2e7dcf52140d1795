#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the SPC monitor.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section has defaults; an empty document yields the three stock
//!   devices (temperature, pressure, radiation) with their original
//!   generation parameters and control limits.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Stock device families. Each carries the generation parameters and control
/// limits it ships with.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Temperature,
    Pressure,
    Radiation,
}

/// Defaults for one device kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePreset {
    pub mean: f64,
    pub stddev: f64,
    pub bias: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub settle_ms: u64,
}

pub const DEFAULT_HOLD_MS: u64 = 2000;
pub const DEFAULT_FAILURE_BACKOFF_MS: u64 = 2000;

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [
        DeviceKind::Temperature,
        DeviceKind::Pressure,
        DeviceKind::Radiation,
    ];

    pub fn preset(self) -> DevicePreset {
        match self {
            DeviceKind::Temperature => DevicePreset {
                mean: 50.0,
                stddev: 5.0,
                bias: 30.0,
                ucl: 60.0,
                lcl: 40.0,
                settle_ms: 1000,
            },
            DeviceKind::Pressure => DevicePreset {
                mean: 5.0,
                stddev: 0.5,
                bias: 4.0,
                ucl: 6.5,
                lcl: 3.5,
                settle_ms: 500,
            },
            DeviceKind::Radiation => DevicePreset {
                mean: 0.2,
                stddev: 0.05,
                bias: 0.2,
                ucl: 0.3,
                lcl: 0.1,
                settle_ms: 500,
            },
        }
    }

    pub fn experiment_number(self) -> u8 {
        match self {
            DeviceKind::Temperature => 1,
            DeviceKind::Pressure => 2,
            DeviceKind::Radiation => 3,
        }
    }

    pub fn quantity(self) -> &'static str {
        match self {
            DeviceKind::Temperature => "Temperature",
            DeviceKind::Pressure => "Pressure",
            DeviceKind::Radiation => "Radiation",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            DeviceKind::Temperature => "°C",
            DeviceKind::Pressure => "bar",
            DeviceKind::Radiation => "mSv/h",
        }
    }

    pub fn default_name(self) -> &'static str {
        match self {
            DeviceKind::Temperature => "temperature_sensor",
            DeviceKind::Pressure => "pressure_sensor",
            DeviceKind::Radiation => "radiation_sensor",
        }
    }
}

/// One simulated device and the sensor that reads it. Every numeric field is
/// optional and falls back to the kind's preset.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DeviceCfg {
    pub kind: DeviceKind,
    /// Unique sensor name; also names the CSV log file.
    pub name: Option<String>,
    pub ucl: Option<f64>,
    pub lcl: Option<f64>,
    /// Start with detailed (per-measurement) log entries enabled.
    #[serde(default)]
    pub verbose: bool,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub bias: Option<f64>,
    pub hold_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub failure_backoff_ms: Option<u64>,
    /// Fixed RNG seed for reproducible data.
    pub seed: Option<u64>,
}

impl DeviceCfg {
    pub fn of_kind(kind: DeviceKind) -> Self {
        Self {
            kind,
            name: None,
            ucl: None,
            lcl: None,
            verbose: false,
            mean: None,
            stddev: None,
            bias: None,
            hold_ms: None,
            settle_ms: None,
            failure_backoff_ms: None,
            seed: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.kind.default_name())
    }

    pub fn ucl(&self) -> f64 {
        self.ucl.unwrap_or(self.kind.preset().ucl)
    }

    pub fn lcl(&self) -> f64 {
        self.lcl.unwrap_or(self.kind.preset().lcl)
    }

    pub fn mean(&self) -> f64 {
        self.mean.unwrap_or(self.kind.preset().mean)
    }

    pub fn stddev(&self) -> f64 {
        self.stddev.unwrap_or(self.kind.preset().stddev)
    }

    pub fn bias(&self) -> f64 {
        self.bias.unwrap_or(self.kind.preset().bias)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms.unwrap_or(DEFAULT_HOLD_MS))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms.unwrap_or(self.kind.preset().settle_ms))
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(
            self.failure_backoff_ms
                .unwrap_or(DEFAULT_FAILURE_BACKOFF_MS),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Sampling {
    /// Sensor poll period while measuring (ms).
    pub period_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self { period_ms: 1000 }
    }
}

/// Look-back windows offered for monitoring queries.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1M")]
    OneMonth,
}

impl TimeWindow {
    pub fn as_duration(self) -> Duration {
        const MIN: u64 = 60;
        const HOUR: u64 = 60 * MIN;
        const DAY: u64 = 24 * HOUR;
        Duration::from_secs(match self {
            TimeWindow::FiveMinutes => 5 * MIN,
            TimeWindow::FifteenMinutes => 15 * MIN,
            TimeWindow::OneHour => HOUR,
            TimeWindow::TwelveHours => 12 * HOUR,
            TimeWindow::OneDay => DAY,
            TimeWindow::FiveDays => 5 * DAY,
            TimeWindow::OneMonth => 30 * DAY,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeWindow::FiveMinutes => "5min",
            TimeWindow::FifteenMinutes => "15min",
            TimeWindow::OneHour => "1h",
            TimeWindow::TwelveHours => "12h",
            TimeWindow::OneDay => "1d",
            TimeWindow::FiveDays => "5d",
            TimeWindow::OneMonth => "1M",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "5min" => TimeWindow::FiveMinutes,
            "15min" => TimeWindow::FifteenMinutes,
            "1h" => TimeWindow::OneHour,
            "12h" => TimeWindow::TwelveHours,
            "1d" => TimeWindow::OneDay,
            "5d" => TimeWindow::FiveDays,
            "1M" => TimeWindow::OneMonth,
            other => eyre::bail!(
                "unknown time window '{other}' (expected 5min, 15min, 1h, 12h, 1d, 5d or 1M)"
            ),
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Monitor {
    /// Evaluate limits and silence on a background thread.
    pub enabled: bool,
    /// Cadence of the SPC evaluation (ms).
    pub interval_ms: u64,
    /// Look-back window of each evaluation.
    pub window: TimeWindow,
    /// How many recent log entries are scanned for the alert banner.
    pub alert_lookback: usize,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2000,
            window: TimeWindow::OneHour,
            alert_lookback: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Entries kept in each sensor's in-memory log ring.
    pub buffer_capacity: usize,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            file: None,
            level: None,
            rotation: None,
            buffer_capacity: 500,
        }
    }
}

pub const DEFAULT_STORAGE_DIR: &str = "logs";
pub const DEFAULT_MEMORY_ROWS: usize = 86_400;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Storage {
    /// Directory for per-sensor CSV append logs (default: `logs`).
    pub dir: String,
    /// Keep measurements in process instead of on disk.
    pub in_memory: bool,
    /// Newest rows kept per sensor by the in-memory store.
    pub memory_rows: usize,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            dir: DEFAULT_STORAGE_DIR.to_owned(),
            in_memory: false,
            memory_rows: DEFAULT_MEMORY_ROWS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub monitor: Monitor,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default = "default_devices", rename = "device")]
    pub devices: Vec<DeviceCfg>,
}

fn default_devices() -> Vec<DeviceCfg> {
    DeviceKind::ALL.into_iter().map(DeviceCfg::of_kind).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: Sampling::default(),
            monitor: Monitor::default(),
            logging: Logging::default(),
            storage: Storage::default(),
            devices: default_devices(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Sensor names become file names, so keep them to a safe alphabet.
pub fn is_valid_sensor_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Config {
    pub fn device(&self, name: &str) -> Option<&DeviceCfg> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Sampling
        if self.sampling.period_ms == 0 {
            eyre::bail!("sampling.period_ms must be >= 1");
        }
        if self.sampling.period_ms > 60 * 1000 {
            eyre::bail!("sampling.period_ms is unreasonably large (>60s)");
        }

        // Monitor
        if self.monitor.interval_ms == 0 {
            eyre::bail!("monitor.interval_ms must be >= 1");
        }
        if self.monitor.alert_lookback == 0 {
            eyre::bail!("monitor.alert_lookback must be >= 1");
        }

        // Logging
        if self.logging.buffer_capacity == 0 {
            eyre::bail!("logging.buffer_capacity must be >= 1");
        }
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly (got '{rot}')");
        }

        // Storage
        if !self.storage.in_memory && self.storage.dir.trim().is_empty() {
            eyre::bail!("storage.dir must not be empty unless storage.in_memory is set");
        }
        if self.storage.memory_rows == 0 {
            eyre::bail!("storage.memory_rows must be >= 1");
        }

        // Devices
        if self.devices.is_empty() {
            eyre::bail!("at least one [[device]] is required");
        }
        let mut seen = HashSet::new();
        for d in &self.devices {
            let name = d.name();
            if !is_valid_sensor_name(name) {
                eyre::bail!("device name '{name}' may only contain letters, digits, '_' and '-'");
            }
            if !seen.insert(name) {
                eyre::bail!("device name '{name}' is used more than once");
            }
            let (ucl, lcl) = (d.ucl(), d.lcl());
            if !ucl.is_finite() || !lcl.is_finite() {
                eyre::bail!("device[{name}] ucl and lcl must be finite");
            }
            if ucl < lcl {
                eyre::bail!("device[{name}] ucl must be >= lcl (ucl={ucl}, lcl={lcl})");
            }
            if !d.mean().is_finite() || !d.bias().is_finite() {
                eyre::bail!("device[{name}] mean and bias must be finite");
            }
            let sd = d.stddev();
            if !sd.is_finite() || sd < 0.0 {
                eyre::bail!("device[{name}] stddev must be finite and >= 0");
            }
            if d.hold_ms == Some(0) {
                eyre::bail!("device[{name}] hold_ms must be >= 1");
            }
            if d.settle_ms == Some(0) {
                eyre::bail!("device[{name}] settle_ms must be >= 1");
            }
            if d.failure_backoff_ms == Some(0) {
                eyre::bail!("device[{name}] failure_backoff_ms must be >= 1");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_stock_devices() {
        let cfg = load_toml("").unwrap();
        let names: Vec<_> = cfg.devices.iter().map(DeviceCfg::name).collect();
        assert_eq!(
            names,
            ["temperature_sensor", "pressure_sensor", "radiation_sensor"]
        );
        assert_eq!(cfg.sampling.period_ms, 1000);
        assert_eq!(cfg.monitor.window, TimeWindow::OneHour);
        cfg.validate().unwrap();
    }

    #[test]
    fn presets_fill_unset_fields() {
        let d = DeviceCfg::of_kind(DeviceKind::Radiation);
        assert_eq!((d.mean(), d.stddev(), d.bias()), (0.2, 0.05, 0.2));
        assert_eq!((d.ucl(), d.lcl()), (0.3, 0.1));
        assert_eq!(d.settle(), Duration::from_millis(500));
        assert_eq!(d.hold(), Duration::from_millis(2000));
    }

    #[test]
    fn time_window_parses_labels() {
        for w in [
            TimeWindow::FiveMinutes,
            TimeWindow::FifteenMinutes,
            TimeWindow::OneHour,
            TimeWindow::TwelveHours,
            TimeWindow::OneDay,
            TimeWindow::FiveDays,
            TimeWindow::OneMonth,
        ] {
            assert_eq!(w.label().parse::<TimeWindow>().unwrap(), w);
        }
        assert!("2h".parse::<TimeWindow>().is_err());
        assert_eq!(TimeWindow::FiveMinutes.as_duration(), Duration::from_secs(300));
    }

    #[test]
    fn sensor_name_alphabet() {
        assert!(is_valid_sensor_name("pressure_sensor-2"));
        assert!(!is_valid_sensor_name("../etc"));
        assert!(!is_valid_sensor_name(""));
    }
}
