//! Generation loop lifecycle: start-once, prompt stop, failure and bias flags.

use rstest::rstest;
use spc_sim::util::wait_until;
use chrono::{DateTime, Utc};
use spc_sim::{ExperimentParams, ExperimentSimulator, SimTiming};
use spc_traits::{Clock, SystemClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn params(mean: f64, stddev: f64, bias: f64) -> ExperimentParams {
    ExperimentParams {
        number: 1,
        quantity: "Temperature".into(),
        unit: "°C".into(),
        mean,
        stddev,
        bias,
        seed: Some(42),
    }
}

fn fast_timing() -> SimTiming {
    SimTiming {
        hold: Duration::from_millis(20),
        settle: Duration::from_millis(10),
        failure_backoff: Duration::from_millis(20),
    }
}

const WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(1);

#[test]
fn start_produces_readings_then_clears_the_slot() {
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), fast_timing()).unwrap();
    let ch = sim.channel();

    assert_eq!(sim.start(), "Experiment 1 started.");
    wait_until(|| ch.peek().is_some(), WAIT, POLL).expect("a reading appears");
    wait_until(|| ch.writes() >= 1 && ch.peek().is_none(), WAIT, POLL)
        .expect("the slot is cleared after the hold interval");

    sim.shutdown();
    assert!(!sim.is_running());
}

#[test]
fn second_start_does_not_spawn_another_loop() {
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), fast_timing()).unwrap();
    sim.start();
    assert_eq!(sim.start(), "Experiment 1 is already running.");
    assert!(sim.is_running());
    sim.shutdown();
}

#[test]
fn restart_after_stop_resumes_generation() {
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), fast_timing()).unwrap();
    let ch = sim.channel();
    sim.start();
    assert_eq!(sim.stop(), "Experiment 1 stopped.");
    let before = ch.writes();
    assert_eq!(sim.start(), "Experiment 1 started.");
    wait_until(|| ch.writes() > before, WAIT, POLL).expect("restarted loop writes");
    sim.shutdown();
}

#[test]
fn shutdown_is_prompt_even_with_long_hold() {
    let timing = SimTiming {
        hold: Duration::from_secs(5),
        settle: Duration::from_secs(5),
        failure_backoff: Duration::from_secs(5),
    };
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), timing).unwrap();
    let ch = sim.channel();
    sim.start();
    wait_until(|| ch.peek().is_some(), WAIT, POLL).expect("first reading");

    let start = Instant::now();
    sim.shutdown();
    let took = start.elapsed();
    assert!(
        took < Duration::from_millis(500),
        "shutdown took {took:?}, expected well under one hold interval"
    );
}

#[test]
fn device_failure_suppresses_output() {
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), fast_timing()).unwrap();
    let ch = sim.channel();
    assert_eq!(sim.toggle_device_failure(), "Device 1 failure simulation active.");
    sim.start();
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(ch.writes(), 0);

    assert_eq!(sim.toggle_device_failure(), "Device 1 failure simulation inactive.");
    wait_until(|| ch.writes() > 0, WAIT, POLL).expect("output resumes");
    sim.shutdown();
}

#[test]
fn bias_toggle_round_trips() {
    let sim = ExperimentSimulator::new(params(50.0, 5.0, 30.0), fast_timing()).unwrap();
    assert!(!sim.bias_injected());
    assert_eq!(sim.toggle_bias(), "Bias 1 injection enabled.");
    assert!(sim.bias_injected());
    assert_eq!(sim.toggle_bias(), "Bias 1 injection disabled.");
    assert!(!sim.bias_injected());
}

#[rstest]
#[case(false)]
#[case(true)]
fn bias_shifts_generated_values(#[case] biased: bool) {
    // stddev 0 pins the unbiased draw at the mean; bias then lands in [0, 100].
    let sim = ExperimentSimulator::new(params(0.0, 0.0, 100.0), fast_timing()).unwrap();
    let ch = sim.channel();
    if biased {
        sim.toggle_bias();
    }
    sim.start();
    let mut seen = None;
    wait_until(
        || {
            seen = ch.peek();
            seen.is_some()
        },
        WAIT,
        POLL,
    )
    .expect("a reading appears");
    let value = seen.map(|r| r.value).unwrap_or(f64::NAN);
    sim.shutdown();

    if biased {
        assert!((0.0..=100.0).contains(&value), "{value}");
        assert!(value > 0.0, "bias should move the value off the mean: {value}");
    } else {
        assert_eq!(value, 0.0);
    }
}

#[test]
fn read_only_parameters_are_exposed() {
    let sim = ExperimentSimulator::new(params(0.2, 0.05, 0.2), fast_timing()).unwrap();
    assert_eq!((sim.mean(), sim.stddev(), sim.bias()), (0.2, 0.05, 0.2));
    let status = sim.status();
    assert!(!status.running && !status.bias_injected && !status.device_failure);
}

/// Real time, except the first sleep panics the calling thread.
#[derive(Clone, Default)]
struct TrippingClock {
    tripped: Arc<AtomicBool>,
}

impl Clock for TrippingClock {
    fn now(&self) -> Instant {
        SystemClock.now()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        SystemClock.timestamp()
    }

    fn sleep(&self, d: Duration) {
        if !self.tripped.swap(true, Ordering::AcqRel) {
            panic!("generation loop blew up");
        }
        std::thread::sleep(d);
    }
}

#[test]
fn restart_reaps_a_panicked_loop_and_resumes() {
    let clock = TrippingClock::default();
    let sim =
        ExperimentSimulator::with_clock(params(50.0, 5.0, 30.0), fast_timing(), clock.clone())
            .unwrap();
    let ch = sim.channel();

    sim.start();
    wait_until(|| clock.tripped.load(Ordering::Acquire), WAIT, POLL).expect("loop panics");
    // Let the panicking thread finish unwinding so start() joins it.
    std::thread::sleep(Duration::from_millis(50));
    let before = ch.writes();
    assert_eq!(before, 1);

    assert_eq!(sim.stop(), "Experiment 1 stopped.");
    assert_eq!(sim.start(), "Experiment 1 started.");
    wait_until(|| ch.writes() > before + 1, WAIT, POLL).expect("replacement loop writes");
    sim.shutdown();
    assert!(!sim.is_running());
}
