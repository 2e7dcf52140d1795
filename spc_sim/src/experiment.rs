//! Synthetic measurement generator.
//!
//! Each `ExperimentSimulator` owns at most one generation thread. The thread
//! draws noisy values, optionally biased, writes them into its `DataChannel`,
//! holds them there for a while and then clears the slot, mimicking a
//! register that only shows the latest conversion for a short time.
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use spc_traits::{Clock, SystemClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::channel::DataChannel;
use crate::error::{Result, SimError};
use crate::util::{round2, sleep_while};

/// Generation parameters; fixed for the lifetime of a simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParams {
    /// Experiment number used in operator messages ("Experiment 1 stopped.").
    pub number: u8,
    /// Human label of the simulated quantity, e.g. "Temperature".
    pub quantity: String,
    pub unit: String,
    pub mean: f64,
    pub stddev: f64,
    pub bias: f64,
    /// Fixed RNG seed for reproducible runs; OS entropy when absent.
    pub seed: Option<u64>,
}

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTiming {
    /// How long a written value stays in the channel before it is cleared.
    pub hold: Duration,
    /// Pause after clearing, before the next value.
    pub settle: Duration,
    /// Idle interval while device failure is simulated.
    pub failure_backoff: Duration,
}

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            hold: Duration::from_millis(2000),
            settle: Duration::from_millis(1000),
            failure_backoff: Duration::from_millis(2000),
        }
    }
}

/// Colour-coded summary of a simulator's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Stopped,
    Failure,
    Biased,
    Nominal,
}

impl Indicator {
    pub fn color(self) -> &'static str {
        match self {
            Indicator::Stopped => "red",
            Indicator::Failure => "purple",
            Indicator::Biased => "orange",
            Indicator::Nominal => "green",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorStatus {
    pub running: bool,
    pub bias_injected: bool,
    pub device_failure: bool,
}

impl SimulatorStatus {
    /// Stopped wins over failure, failure over bias.
    pub fn indicator(&self) -> Indicator {
        if !self.running {
            Indicator::Stopped
        } else if self.device_failure {
            Indicator::Failure
        } else if self.bias_injected {
            Indicator::Biased
        } else {
            Indicator::Nominal
        }
    }
}

/// Draw one value: Normal(mean, stddev) rounded to 2 decimals, plus an
/// Uniform(bias, stddev) offset when bias is injected.
///
/// The uniform bounds are taken in that order even when `bias > stddev`;
/// the draw is then simply mirrored into `[stddev, bias]`.
pub fn draw_value<R: Rng + ?Sized>(
    normal: &Normal<f64>,
    params: &ExperimentParams,
    bias_injected: bool,
    rng: &mut R,
) -> f64 {
    let mut value = round2(normal.sample(rng));
    if bias_injected {
        let u: f64 = rng.random();
        let delta = round2(params.bias + (params.stddev - params.bias) * u);
        value = round2(value + delta);
    }
    value
}

#[derive(Debug, Default)]
struct Flags {
    running: AtomicBool,
    bias_injected: AtomicBool,
    device_failure: AtomicBool,
    /// Bumped on every start so a stale loop can tell it has been superseded.
    epoch: AtomicU64,
}

impl Flags {
    fn is_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::Acquire) && self.epoch.load(Ordering::Acquire) == epoch
    }

    fn toggle(flag: &AtomicBool) -> bool {
        !flag.fetch_xor(true, Ordering::AcqRel)
    }
}

pub struct ExperimentSimulator<C: Clock + Clone + Send + Sync + 'static = SystemClock> {
    params: ExperimentParams,
    timing: SimTiming,
    normal: Normal<f64>,
    channel: Arc<DataChannel>,
    flags: Arc<Flags>,
    clock: C,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExperimentSimulator<SystemClock> {
    pub fn new(params: ExperimentParams, timing: SimTiming) -> Result<Self> {
        Self::with_clock(params, timing, SystemClock::new())
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> ExperimentSimulator<C> {
    pub fn with_clock(params: ExperimentParams, timing: SimTiming, clock: C) -> Result<Self> {
        if !params.mean.is_finite() || !params.bias.is_finite() {
            return Err(SimError::InvalidParams(format!(
                "experiment {}: mean and bias must be finite",
                params.number
            )));
        }
        let normal = Normal::new(params.mean, params.stddev).map_err(|e| {
            SimError::InvalidParams(format!(
                "experiment {}: stddev {}: {e}",
                params.number, params.stddev
            ))
        })?;
        Ok(Self {
            params,
            timing,
            normal,
            channel: Arc::new(DataChannel::new()),
            flags: Arc::new(Flags::default()),
            clock,
            worker: Mutex::new(None),
        })
    }

    /// Start generating unless a generation loop is already active.
    pub fn start(&self) -> String {
        let n = self.params.number;
        let mut worker = self.worker.lock();
        if self.flags.running.swap(true, Ordering::AcqRel) {
            tracing::debug!(experiment = n, "start ignored, already running");
            return format!("Experiment {n} is already running.");
        }
        let epoch = self.flags.epoch.fetch_add(1, Ordering::AcqRel) + 1;

        // A superseded loop exits on its own; reap it if it already has.
        if let Some(prev) = worker.take()
            && prev.is_finished()
        {
            self.reap(prev);
        }

        let params = self.params.clone();
        let timing = self.timing;
        let normal = self.normal.clone();
        let channel = self.channel.clone();
        let flags = self.flags.clone();
        let clock = self.clock.clone();
        *worker = Some(std::thread::spawn(move || {
            generation_loop(&params, timing, &normal, &channel, &flags, &clock, epoch);
        }));

        tracing::info!(experiment = n, "experiment started");
        format!("Experiment {n} started.")
    }

    /// Ask the generation loop to exit; it does so within one slice of its
    /// current sleep.
    pub fn stop(&self) -> String {
        let n = self.params.number;
        self.flags.running.store(false, Ordering::Release);
        tracing::info!(experiment = n, "experiment stopped");
        format!("Experiment {n} stopped.")
    }

    /// Stop and wait for the generation thread to finish.
    pub fn shutdown(&self) {
        self.flags.running.store(false, Ordering::Release);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            self.reap(handle);
        }
    }

    fn reap(&self, handle: JoinHandle<()>) {
        if let Err(e) = handle.join() {
            tracing::warn!(?e, experiment = self.params.number, "generation thread panicked");
        }
    }

    pub fn toggle_bias(&self) -> String {
        let on = Flags::toggle(&self.flags.bias_injected);
        let state = if on { "enabled" } else { "disabled" };
        tracing::info!(experiment = self.params.number, state, "bias injection toggled");
        format!("Bias {} injection {state}.", self.params.number)
    }

    pub fn toggle_device_failure(&self) -> String {
        let on = Flags::toggle(&self.flags.device_failure);
        let state = if on { "active" } else { "inactive" };
        tracing::info!(experiment = self.params.number, state, "device failure toggled");
        format!("Device {} failure simulation {state}.", self.params.number)
    }

    pub fn status(&self) -> SimulatorStatus {
        SimulatorStatus {
            running: self.flags.running.load(Ordering::Acquire),
            bias_injected: self.flags.bias_injected.load(Ordering::Acquire),
            device_failure: self.flags.device_failure.load(Ordering::Acquire),
        }
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::Acquire)
    }

    pub fn bias_injected(&self) -> bool {
        self.flags.bias_injected.load(Ordering::Acquire)
    }

    pub fn device_failure(&self) -> bool {
        self.flags.device_failure.load(Ordering::Acquire)
    }

    pub fn mean(&self) -> f64 {
        self.params.mean
    }

    pub fn stddev(&self) -> f64 {
        self.params.stddev
    }

    pub fn bias(&self) -> f64 {
        self.params.bias
    }

    pub fn params(&self) -> &ExperimentParams {
        &self.params
    }

    /// The slot this simulator writes into; hand it to the paired sensor.
    pub fn channel(&self) -> Arc<DataChannel> {
        self.channel.clone()
    }

    /// One-line summary of the expected data, e.g.
    /// `Experiment 2: {Pressure mean: 5 bar, stddev: 0.5 bar, bias: 4 bar}`.
    pub fn describe(&self) -> String {
        let p = &self.params;
        format!(
            "Experiment {}: {{{} mean: {} {unit}, stddev: {} {unit}, bias: {} {unit}}}",
            p.number,
            p.quantity,
            p.mean,
            p.stddev,
            p.bias,
            unit = p.unit
        )
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> Drop for ExperimentSimulator<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn generation_loop<C: Clock>(
    params: &ExperimentParams,
    timing: SimTiming,
    normal: &Normal<f64>,
    channel: &DataChannel,
    flags: &Flags,
    clock: &C,
    epoch: u64,
) {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let current = || flags.is_current(epoch);

    while current() {
        if flags.device_failure.load(Ordering::Acquire) {
            sleep_while(clock, timing.failure_backoff, current);
            continue;
        }

        let bias = flags.bias_injected.load(Ordering::Acquire);
        let value = draw_value(normal, params, bias, &mut rng);
        channel.write(value, clock.timestamp());
        tracing::debug!(experiment = params.number, value, bias, "generated reading");

        let held = sleep_while(clock, timing.hold, current);
        channel.clear();
        if !held {
            break;
        }
        sleep_while(clock, timing.settle, current);
    }
    tracing::trace!(experiment = params.number, "generation loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mean: f64, stddev: f64, bias: f64) -> ExperimentParams {
        ExperimentParams {
            number: 1,
            quantity: "Temperature".into(),
            unit: "°C".into(),
            mean,
            stddev,
            bias,
            seed: Some(7),
        }
    }

    #[test]
    fn draws_are_rounded_to_two_decimals() {
        let p = params(50.0, 5.0, 30.0);
        let normal = Normal::new(p.mean, p.stddev).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let v = draw_value(&normal, &p, false, &mut rng);
            assert!((v * 100.0 - (v * 100.0).round()).abs() < 1e-6, "{v}");
        }
    }

    #[test]
    fn zero_stddev_is_deterministic_without_bias() {
        let p = params(5.0, 0.0, 4.0);
        let normal = Normal::new(p.mean, p.stddev).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(draw_value(&normal, &p, false, &mut rng), 5.0);
    }

    #[test]
    fn bias_offset_lies_between_stddev_and_bias() {
        // bias > stddev: uniform(bias, stddev) covers [stddev, bias]
        let p = params(0.0, 0.0, 30.0);
        let normal = Normal::new(p.mean, p.stddev).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let v = draw_value(&normal, &p, true, &mut rng);
            assert!((0.0..=30.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn rejects_negative_stddev() {
        let err = ExperimentSimulator::new(params(1.0, -1.0, 0.0), SimTiming::default())
            .err()
            .expect("negative stddev must fail");
        assert!(matches!(err, SimError::InvalidParams(_)));
    }

    #[test]
    fn indicator_precedence() {
        let mut s = SimulatorStatus {
            running: false,
            bias_injected: true,
            device_failure: true,
        };
        assert_eq!(s.indicator(), Indicator::Stopped);
        s.running = true;
        assert_eq!(s.indicator(), Indicator::Failure);
        s.device_failure = false;
        assert_eq!(s.indicator().color(), "orange");
        s.bias_injected = false;
        assert_eq!(s.indicator().color(), "green");
    }

    #[test]
    fn describe_lists_parameters_with_unit() {
        let mut p = params(5.0, 0.5, 4.0);
        p.number = 2;
        p.quantity = "Pressure".into();
        p.unit = "bar".into();
        let sim = ExperimentSimulator::new(p, SimTiming::default()).unwrap();
        assert_eq!(
            sim.describe(),
            "Experiment 2: {Pressure mean: 5 bar, stddev: 0.5 bar, bias: 4 bar}"
        );
    }
}
