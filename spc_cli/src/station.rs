//! Composition root: one simulator and one sensor per configured device, a
//! shared measurement store and the background monitor.

use eyre::WrapErr;
use spc_config::{Config, DeviceCfg, DeviceKind};
use spc_core::conversions::sensor_settings;
use spc_core::error::SpcError;
use spc_core::{
    CsvStore, MemoryStore, Monitor, MonitorCycle, MonitorSettings, SensorController,
};
use spc_sim::{ExperimentParams, ExperimentSimulator, SimTiming};
use spc_traits::{MeasurementStore, SystemClock};
use std::sync::Arc;

pub struct Device {
    pub kind: DeviceKind,
    pub sim: ExperimentSimulator,
    pub sensor: Arc<SensorController>,
}

pub struct Station {
    devices: Vec<Device>,
    store: Arc<dyn MeasurementStore + Send + Sync>,
    monitor_settings: MonitorSettings,
    monitor_enabled: bool,
    alert_lookback: usize,
    monitor: Option<Monitor>,
    shut_down: bool,
}

fn sim_parts(d: &DeviceCfg) -> (ExperimentParams, SimTiming) {
    let params = ExperimentParams {
        number: d.kind.experiment_number(),
        quantity: d.kind.quantity().to_owned(),
        unit: d.kind.unit().to_owned(),
        mean: d.mean(),
        stddev: d.stddev(),
        bias: d.bias(),
        seed: d.seed,
    };
    let timing = SimTiming {
        hold: d.hold(),
        settle: d.settle(),
        failure_backoff: d.failure_backoff(),
    };
    (params, timing)
}

impl Station {
    /// Assemble everything from a validated config. Nothing is started.
    pub fn build(cfg: &Config) -> eyre::Result<Self> {
        let storage = &cfg.storage;
        let store: Arc<dyn MeasurementStore + Send + Sync> = if storage.in_memory {
            Arc::new(MemoryStore::with_rows_per_sensor(storage.memory_rows))
        } else {
            let dir = &storage.dir;
            Arc::new(CsvStore::open(dir).wrap_err_with(|| format!("open storage dir {dir}"))?)
        };

        let mut devices = Vec::with_capacity(cfg.devices.len());
        for d in &cfg.devices {
            let (params, timing) = sim_parts(d);
            let sim = ExperimentSimulator::new(params, timing)
                .wrap_err_with(|| format!("device[{}]", d.name()))?;
            let sensor = SensorController::builder(d.name())
                .with_probe(sim.channel())
                .with_store(Arc::clone(&store))
                .with_settings(sensor_settings(cfg, d))
                .build()
                .wrap_err_with(|| format!("device[{}]", d.name()))?;
            tracing::debug!(device = d.name(), kind = ?d.kind, "device assembled");
            devices.push(Device {
                kind: d.kind,
                sim,
                sensor: Arc::new(sensor),
            });
        }

        Ok(Self {
            devices,
            store,
            monitor_settings: MonitorSettings::from(&cfg.monitor),
            monitor_enabled: cfg.monitor.enabled,
            alert_lookback: cfg.monitor.alert_lookback,
            monitor: None,
            shut_down: false,
        })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn alert_lookback(&self) -> usize {
        self.alert_lookback
    }

    pub fn sensor(&self, name: &str) -> Result<&SensorController, SpcError> {
        self.devices
            .iter()
            .find(|d| d.sensor.name() == name)
            .map(|d| d.sensor.as_ref())
            .ok_or_else(|| SpcError::UnknownSensor(name.to_owned()))
    }

    /// Look a simulator up by its device name, kind or experiment number.
    pub fn sim(&self, key: &str) -> Result<&ExperimentSimulator, SpcError> {
        self.devices
            .iter()
            .find(|d| {
                d.sensor.name() == key
                    || d.kind.default_name().strip_suffix("_sensor") == Some(key)
                    || d.sim.params().number.to_string() == key
            })
            .map(|d| &d.sim)
            .ok_or_else(|| SpcError::UnknownSimulator(key.to_owned()))
    }

    /// Start every simulator and power every sensor on; optionally begin measuring.
    pub fn start_all(&self, measure: bool) {
        for d in &self.devices {
            let msg = d.sim.start();
            tracing::info!(device = d.sensor.name(), "{msg}");
            d.sensor.start();
            if measure && let Err(e) = d.sensor.start_measuring() {
                tracing::warn!(device = d.sensor.name(), error = %e, "could not start measuring");
            }
        }
    }

    /// Spawn the monitor thread unless disabled in config or already running.
    pub fn start_monitor(&mut self) {
        if !self.monitor_enabled || self.monitor.is_some() {
            return;
        }
        let sensors = self.devices.iter().map(|d| Arc::clone(&d.sensor)).collect();
        let cycle = MonitorCycle::new(
            sensors,
            Arc::clone(&self.store),
            Arc::new(SystemClock::new()),
            self.monitor_settings.window,
        );
        self.monitor = Some(Monitor::spawn(cycle, &self.monitor_settings));
        tracing::info!(
            interval_ms = self.monitor_settings.interval.as_millis() as u64,
            "monitor started"
        );
    }

    /// Stop the monitor, power sensors off and join every background thread.
    pub fn shutdown(&mut self) {
        if std::mem::replace(&mut self.shut_down, true) {
            return;
        }
        drop(self.monitor.take());
        for d in &self.devices {
            d.sensor.stop();
            d.sensor.shutdown();
            d.sim.shutdown();
        }
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub(crate) fn in_memory_config() -> Config {
    let mut cfg = Config::default();
    cfg.storage.in_memory = true;
    cfg
}
