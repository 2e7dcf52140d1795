#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Simulated measurement devices.
//!
//! An `ExperimentSimulator` plays the physical device: it generates values on
//! its own thread and exposes them through a `DataChannel`, which implements
//! `spc_traits::Probe` for the consuming sensor.
pub mod channel;
pub mod error;
pub mod experiment;
pub mod util;

pub use channel::DataChannel;
pub use error::SimError;
pub use experiment::{
    ExperimentParams, ExperimentSimulator, Indicator, SimTiming, SimulatorStatus, draw_value,
};
