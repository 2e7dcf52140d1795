//! Sensor lifecycle state machine and ingestion loop.
//!
//! A `SensorController` owns at most one sampling thread. The thread exists
//! only while the sensor is MEASURING; every command that leaves MEASURING
//! makes it exit within one sleep slice. Each measuring run carries a run
//! number, so a loop left over from a quick IDLE → MEASURING round-trip sees
//! that it has been superseded and exits instead of sampling twice.
use parking_lot::Mutex;
use serde::Serialize;
use spc_traits::{Clock, MeasurementStore, Measurement, Probe, sleep_while};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::builder::{Missing, SensorBuilder};
use crate::config::{Limits, SensorSettings};
use crate::error::CommandError;
use crate::log::{LogEntry, LogRing, Severity};
use crate::monitoring::MonitoringService;
use crate::util::{display_ts, logged_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorState {
    Off,
    On,
    Measuring,
    Idle,
}

impl SensorState {
    pub const ALL: [SensorState; 4] = [
        SensorState::Off,
        SensorState::On,
        SensorState::Measuring,
        SensorState::Idle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorState::Off => "off",
            SensorState::On => "on",
            SensorState::Measuring => "measuring",
            SensorState::Idle => "idle",
        }
    }

    /// Status indicator colour shown next to the sensor.
    pub fn color(self) -> &'static str {
        match self {
            SensorState::Off => "red",
            SensorState::On => "green",
            SensorState::Measuring => "blue",
            SensorState::Idle => "orange",
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SensorState::Off => "OFF",
            SensorState::On => "ON",
            SensorState::Measuring => "MEASURING",
            SensorState::Idle => "IDLE",
        })
    }
}

/// Point-in-time view of a sensor for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorStatus {
    pub name: String,
    pub state: SensorState,
    pub last_value: Option<f64>,
    pub ucl: f64,
    pub lcl: f64,
    pub verbose: bool,
}

struct Inner {
    state: SensorState,
    limits: Limits,
    verbose: bool,
    last_value: Option<f64>,
    /// Bumped on every transition into MEASURING and on shutdown.
    run: u64,
}

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    log: Mutex<LogRing>,
    clock: Arc<dyn Clock + Send + Sync>,
    probe: Arc<dyn Probe + Send + Sync>,
    store: Arc<dyn MeasurementStore + Send + Sync>,
    period: Duration,
}

impl Shared {
    fn record(&self, severity: Severity, message: String) {
        let entry = LogEntry {
            timestamp: self.clock.timestamp(),
            severity,
            message,
        };
        self.log.lock().push(entry);
    }

    fn is_current(&self, run: u64) -> bool {
        let inner = self.inner.lock();
        inner.state == SensorState::Measuring && inner.run == run
    }

    fn verbose(&self) -> bool {
        self.inner.lock().verbose
    }

    fn ingest_once(&self) {
        let name = self.name.as_str();
        let reading = match self.probe.read() {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::debug!(sensor = name, "no data pending");
                if self.verbose() {
                    self.record(Severity::Error, format!("{name}: no data available"));
                }
                return;
            }
            Err(e) => {
                tracing::warn!(sensor = name, error = %e, "unreadable payload");
                self.record(Severity::Error, format!("{name}: error reading data: {e}"));
                return;
            }
        };

        let measurement = Measurement {
            value: reading.value,
            measured_at: reading.generated_at,
            logged_at: logged_at(self.clock.timestamp(), reading.generated_at),
        };
        if let Err(e) = self.store.append(name, &measurement) {
            tracing::warn!(sensor = name, error = %e, "measurement dropped");
            self.record(
                Severity::Error,
                format!("{name}: failed to store measurement: {e}"),
            );
            return;
        }

        let verbose = {
            let mut inner = self.inner.lock();
            inner.last_value = Some(measurement.value);
            inner.verbose
        };
        tracing::debug!(sensor = name, value = measurement.value, "measured");
        if verbose {
            self.record(
                Severity::Info,
                format!(
                    "Measured {} at {}",
                    measurement.value,
                    display_ts(measurement.measured_at)
                ),
            );
        }
    }
}

fn sampling_loop(shared: &Shared, run: u64) {
    tracing::debug!(sensor = %shared.name, run, "sampling loop started");
    let current = || shared.is_current(run);
    while current() {
        shared.ingest_once();
        if !sleep_while(shared.clock.as_ref(), shared.period, current) {
            break;
        }
    }
    tracing::trace!(sensor = %shared.name, run, "sampling loop exiting");
}

/// One sensor: state machine, limits, operator log and sampling thread.
///
/// All methods take `&self` and may be called from any thread.
pub struct SensorController {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SensorController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("SensorController")
            .field("name", &self.shared.name)
            .field("state", &inner.state)
            .field("limits", &inner.limits)
            .field("verbose", &inner.verbose)
            .finish()
    }
}

impl SensorController {
    /// Start building a sensor.
    pub fn builder(name: impl Into<String>) -> SensorBuilder<Missing, Missing> {
        SensorBuilder::new(name.into())
    }

    pub(crate) fn from_parts(
        name: String,
        settings: SensorSettings,
        clock: Arc<dyn Clock + Send + Sync>,
        probe: Arc<dyn Probe + Send + Sync>,
        store: Arc<dyn MeasurementStore + Send + Sync>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                inner: Mutex::new(Inner {
                    state: SensorState::Off,
                    limits: settings.limits,
                    verbose: settings.verbose,
                    last_value: None,
                    run: 0,
                }),
                log: Mutex::new(LogRing::with_capacity(settings.log_capacity)),
                clock,
                probe,
                store,
                period: settings.period,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> SensorState {
        self.shared.inner.lock().state
    }

    pub fn limits(&self) -> Limits {
        self.shared.inner.lock().limits
    }

    pub fn is_verbose(&self) -> bool {
        self.shared.verbose()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.shared.inner.lock().last_value
    }

    /// Power on from any state.
    pub fn start(&self) {
        self.transition(SensorState::On, "is now ON");
    }

    /// Power off from any state. A running sampling loop exits on its next check.
    pub fn stop(&self) {
        self.transition(SensorState::Off, "is now OFF");
    }

    fn transition(&self, to: SensorState, what: &str) {
        let from = std::mem::replace(&mut self.shared.inner.lock().state, to);
        tracing::info!(sensor = %self.shared.name, %from, %to, "state change");
        self.shared
            .record(Severity::Info, format!("{} {what}", self.shared.name));
    }

    /// ON or IDLE → MEASURING, spawning the sampling loop.
    pub fn start_measuring(&self) -> Result<(), CommandError> {
        let name = self.shared.name.as_str();
        // Held from the transition until the new loop is spawned, so the
        // handle taken below always belongs to a superseded run.
        let mut worker = self.worker.lock();
        let run = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SensorState::On | SensorState::Idle => {
                    inner.state = SensorState::Measuring;
                    inner.run = inner.run.wrapping_add(1);
                    inner.run
                }
                state => {
                    drop(inner);
                    tracing::warn!(sensor = name, %state, "start measuring rejected");
                    self.shared
                        .record(Severity::Info, format!("{name} must be ON to start measuring"));
                    return Err(CommandError::NotReady {
                        sensor: name.to_owned(),
                        state,
                    });
                }
            }
        };
        tracing::info!(sensor = name, run, "measuring");
        self.shared
            .record(Severity::Info, format!("{name} started measuring"));

        if let Some(prev) = worker.take() {
            // Superseded by the run bump above; exits within one sleep slice.
            join_quietly(name, prev);
        }
        let shared = Arc::clone(&self.shared);
        *worker = Some(std::thread::spawn(move || sampling_loop(&shared, run)));
        Ok(())
    }

    /// MEASURING → IDLE. Returns false (and does nothing) from any other state.
    pub fn stop_measuring(&self) -> bool {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SensorState::Measuring {
                return false;
            }
            inner.state = SensorState::Idle;
        }
        tracing::info!(sensor = %self.shared.name, "idle");
        self.shared
            .record(Severity::Info, format!("{} is now IDLE", self.shared.name));
        true
    }

    /// Replace both control limits at once.
    pub fn set_limits(&self, ucl: f64, lcl: f64) -> Result<(), CommandError> {
        let limits = Limits::new(ucl, lcl).inspect_err(|e| {
            tracing::warn!(sensor = %self.shared.name, error = %e, "limits rejected");
        })?;
        self.shared.inner.lock().limits = limits;
        tracing::info!(sensor = %self.shared.name, ucl, lcl, "limits updated");
        Ok(())
    }

    /// Flip per-measurement logging. Returns the new setting.
    pub fn toggle_verbose_logging(&self) -> bool {
        let verbose = {
            let mut inner = self.shared.inner.lock();
            inner.verbose = !inner.verbose;
            inner.verbose
        };
        let word = if verbose { "ON" } else { "OFF" };
        self.shared.record(
            Severity::Info,
            format!("{} detailed logs turned {word}", self.shared.name),
        );
        verbose
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(sensor = %self.shared.name, "{message}");
        self.shared.record(Severity::Warning, message);
    }

    /// Rendered operator log, most recent last.
    pub fn get_logs(&self) -> Vec<String> {
        self.shared.log.lock().lines()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.shared.log.lock().iter().cloned().collect()
    }

    /// Alert banner text for the newest warning among the last `lookback` entries.
    pub fn latest_alert(&self, lookback: usize) -> Option<String> {
        self.shared
            .log
            .lock()
            .latest_warning(lookback)
            .map(|e| format!("ALERT: {e}"))
    }

    /// Leave MEASURING if needed, power off, and note it in the log.
    pub fn disable(&self) {
        self.stop_measuring();
        self.stop();
        self.shared.record(
            Severity::Info,
            format!("{} has been disabled", self.shared.name),
        );
    }

    /// SPC checker over this sensor's current state and limits, taken under
    /// one lock.
    pub fn monitoring_service(&self) -> MonitoringService {
        let inner = self.shared.inner.lock();
        MonitoringService::new(self.shared.name.clone(), inner.state, inner.limits)
    }

    pub fn status(&self) -> SensorStatus {
        let inner = self.shared.inner.lock();
        SensorStatus {
            name: self.shared.name.clone(),
            state: inner.state,
            last_value: inner.last_value,
            ucl: inner.limits.ucl(),
            lcl: inner.limits.lcl(),
            verbose: inner.verbose,
        }
    }

    /// Run one ingestion step now, regardless of state.
    pub fn ingest_once(&self) {
        self.shared.ingest_once();
    }

    /// Stop the sampling thread and wait for it, without a state transition.
    pub fn shutdown(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.run = inner.run.wrapping_add(1);
        }
        if let Some(handle) = self.worker.lock().take() {
            join_quietly(&self.shared.name, handle);
        }
    }
}

fn join_quietly(sensor: &str, handle: JoinHandle<()>) {
    match handle.join() {
        Ok(()) => tracing::trace!(sensor, "sampling thread joined"),
        Err(e) => tracing::warn!(sensor, ?e, "sampling thread panicked"),
    }
}

impl Drop for SensorController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingStore, ScriptedProbe};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use spc_traits::{ManualClock, Reading};

    fn sensor_with(
        probe: ScriptedProbe,
        store: Arc<dyn MeasurementStore + Send + Sync>,
    ) -> SensorController {
        let t0 = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = ManualClock::starting_at(t0);
        SensorController::builder("temperature_sensor")
            .with_probe(Arc::new(probe))
            .with_store(store)
            .with_clock(clock)
            .build()
            .unwrap()
    }

    fn idle_sensor() -> SensorController {
        sensor_with(ScriptedProbe::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn starts_off_and_powers_on() {
        let s = idle_sensor();
        assert_eq!(s.state(), SensorState::Off);
        s.start();
        assert_eq!(s.state(), SensorState::On);
        assert!(s.get_logs()[0].ends_with(": temperature_sensor is now ON"));
    }

    #[test]
    fn start_measuring_from_off_is_rejected() {
        let s = idle_sensor();
        let err = s.start_measuring().unwrap_err();
        assert_eq!(
            err,
            CommandError::NotReady {
                sensor: "temperature_sensor".into(),
                state: SensorState::Off
            }
        );
        assert_eq!(s.state(), SensorState::Off);
        assert!(
            s.get_logs()
                .last()
                .unwrap()
                .ends_with("temperature_sensor must be ON to start measuring")
        );
    }

    #[test]
    fn stop_measuring_while_on_leaves_state_on() {
        let s = idle_sensor();
        s.start();
        assert!(!s.stop_measuring());
        assert_eq!(s.state(), SensorState::On);
        assert_eq!(s.get_logs().len(), 1);
    }

    #[test]
    fn set_limits_rejects_inverted_pair() {
        let s = idle_sensor();
        s.set_limits(50.0, 10.0).unwrap();
        assert!(matches!(
            s.set_limits(10.0, 50.0),
            Err(CommandError::InvalidLimits { .. })
        ));
        let l = s.limits();
        assert_eq!((l.ucl(), l.lcl()), (50.0, 10.0));
    }

    #[test]
    fn monitoring_service_sees_current_limits() {
        let s = idle_sensor();
        s.set_limits(50.0, 10.0).unwrap();
        let at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let m = |value| Measurement {
            value,
            measured_at: at,
            logged_at: at,
        };

        let svc = s.monitoring_service();
        assert_eq!(svc.limits(), s.limits());
        let warnings = svc.check_out_of_control(&[m(75.0), m(30.0), m(5.0)]);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Value 75 at"));
        assert!(warnings[1].contains("Value 5 at"));
    }

    #[test]
    fn toggle_verbose_reports_new_setting() {
        let s = idle_sensor();
        assert!(s.toggle_verbose_logging());
        assert!(!s.toggle_verbose_logging());
        let logs = s.get_logs();
        assert!(logs[0].ends_with("temperature_sensor detailed logs turned ON"));
        assert!(logs[1].ends_with("temperature_sensor detailed logs turned OFF"));
    }

    #[test]
    fn ingest_persists_and_updates_last_value() {
        let t0 = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 7, 59, 59).unwrap();
        let store = Arc::new(MemoryStore::new());
        let s = sensor_with(
            ScriptedProbe::new([Ok(Some(Reading {
                value: 51.25,
                generated_at: t0,
            }))]),
            store.clone(),
        );
        s.toggle_verbose_logging();
        s.ingest_once();

        assert_eq!(s.last_value(), Some(51.25));
        let rows = store.query_window("temperature_sensor", t0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].measured_at, t0);
        assert!(rows[0].logged_at >= rows[0].measured_at);
        assert!(
            s.get_logs()
                .last()
                .unwrap()
                .ends_with("Measured 51.25 at 2024-05-01 07:59:59.000000")
        );
    }

    #[test]
    fn absent_reading_is_logged_only_when_verbose() {
        let s = idle_sensor();
        s.ingest_once();
        assert!(s.get_logs().is_empty());

        s.toggle_verbose_logging();
        s.ingest_once();
        assert!(
            s.get_logs()
                .last()
                .unwrap()
                .ends_with("temperature_sensor: no data available")
        );
    }

    #[test]
    fn malformed_reading_is_logged_and_skipped() {
        let s = sensor_with(
            ScriptedProbe::new([Err("garbled".into())]),
            Arc::new(MemoryStore::new()),
        );
        s.ingest_once();
        let entries = s.log_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Error);
        assert!(entries[0].message.contains("garbled"));
        assert_eq!(s.last_value(), None);
    }

    #[test]
    fn storage_failure_drops_measurement() {
        let s = sensor_with(
            ScriptedProbe::new([Ok(Some(Reading {
                value: 1.0,
                generated_at: chrono::Utc::now(),
            }))]),
            Arc::new(FailingStore),
        );
        s.ingest_once();
        assert_eq!(s.last_value(), None);
        assert!(s.get_logs()[0].contains("failed to store measurement"));
    }

    #[test]
    fn latest_alert_formats_banner() {
        let s = idle_sensor();
        assert!(s.latest_alert(5).is_none());
        s.log_warning("temperature_sensor: Value 75 at t0 is out of control limits.");
        assert_eq!(
            s.latest_alert(5).as_deref(),
            Some("ALERT: WARNING: temperature_sensor: Value 75 at t0 is out of control limits.")
        );
    }

    #[test]
    fn disable_from_measuring_ends_off() {
        let s = idle_sensor();
        s.start();
        s.start_measuring().unwrap();
        s.disable();
        assert_eq!(s.state(), SensorState::Off);
        let logs = s.get_logs();
        assert!(logs[logs.len() - 3].ends_with("is now IDLE"));
        assert!(logs[logs.len() - 2].ends_with("is now OFF"));
        assert!(logs[logs.len() - 1].ends_with("temperature_sensor has been disabled"));
    }

    #[test]
    fn state_colors() {
        let colors: Vec<_> = SensorState::ALL.iter().map(|s| s.color()).collect();
        assert_eq!(colors, ["red", "green", "blue", "orange"]);
    }
}
