//! Background SPC monitor.
//!
//! Spawns a thread that, on a fixed cadence, queries each sensor's recent
//! window from the store, runs the `MonitoringService` checks and routes the
//! resulting warnings into the sensor's log.
//!
//! Each `Monitor` spawns exactly one thread, shut down when the `Monitor` is
//! dropped. Shutdown is signalled by disconnecting a channel the thread waits
//! on between cycles, so it never waits out a full interval.
use chrono::{DateTime, Utc};
use crossbeam_channel as xch;
use spc_traits::{Clock, MeasurementStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorSettings;
use crate::sensor::SensorController;
use crate::util::window_start;

/// State carried from one evaluation cycle to the next.
///
/// Out-of-control warnings are routed once per measurement: the newest
/// `measured_at` already reported is remembered per sensor. Device-failure
/// warnings fire on every cycle in which the condition holds.
pub struct MonitorCycle {
    sensors: Vec<Arc<SensorController>>,
    store: Arc<dyn MeasurementStore + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    window: Duration,
    reported_up_to: HashMap<String, DateTime<Utc>>,
}

impl MonitorCycle {
    pub fn new(
        sensors: Vec<Arc<SensorController>>,
        store: Arc<dyn MeasurementStore + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        window: Duration,
    ) -> Self {
        Self {
            sensors,
            store,
            clock,
            window,
            reported_up_to: HashMap::new(),
        }
    }

    /// Evaluate every sensor once. Returns the number of warnings routed.
    pub fn run_once(&mut self) -> usize {
        let since = window_start(self.clock.timestamp(), self.window);
        let mut routed = 0;
        for sensor in &self.sensors {
            let name = sensor.name();
            let batch = match self.store.query_window(name, since) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(sensor = name, error = %e, "window query failed; skipping");
                    continue;
                }
            };
            let svc = sensor.monitoring_service();

            let mut warnings = svc.check_device_failure(&batch);
            let mark = self.reported_up_to.get(name).copied();
            let fresh: Vec<_> = batch
                .iter()
                .filter(|m| mark.is_none_or(|t| m.measured_at > t))
                .copied()
                .collect();
            warnings.extend(svc.check_out_of_control(&fresh));
            if let Some(newest) = batch.iter().map(|m| m.measured_at).max() {
                let entry = self.reported_up_to.entry(name.to_owned()).or_insert(newest);
                *entry = (*entry).max(newest);
            }

            tracing::debug!(
                sensor = name,
                batch = batch.len(),
                warnings = warnings.len(),
                "monitor cycle"
            );
            routed += warnings.len();
            for w in warnings {
                sensor.log_warning(w);
            }
        }
        routed
    }
}

pub struct Monitor {
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Monitor {
    /// Evaluate immediately, then once per `settings.interval` until dropped.
    pub fn spawn(mut cycle: MonitorCycle, settings: &MonitorSettings) -> Self {
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let interval = settings.interval;

        let join_handle = std::thread::spawn(move || {
            loop {
                cycle.run_once();
                match stop_rx.recv_timeout(interval) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Monitor thread received shutdown signal");
                        break;
                    }
                }
            }
            tracing::trace!("Monitor thread exiting cleanly");
        });

        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        // Disconnecting wakes the thread out of its wait.
        drop(self.stop_tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("Monitor thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "Monitor thread panicked during shutdown");
                }
            }
        }
    }
}
