#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core SPC monitoring logic (device-agnostic).
//!
//! This crate provides the sensor state machine, the ingestion loop and the
//! SPC evaluator. Devices are reached only through `spc_traits::Probe`, and
//! persistence only through `spc_traits::MeasurementStore`.
//!
//! ## Architecture
//!
//! - **Sensor**: OFF/ON/MEASURING/IDLE state machine with a sampling thread (`sensor`)
//! - **Builder**: type-state construction of sensors (`builder`)
//! - **Log ring**: bounded, structured operator log (`log`)
//! - **Monitoring**: pure out-of-control and device-failure checks (`monitoring`)
//! - **Monitor**: background thread routing warnings into sensor logs (`monitor`)
//! - **Stores**: in-memory and CSV `MeasurementStore`s (`store`)

pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod log;
pub mod mocks;
pub mod monitor;
pub mod monitoring;
pub mod sensor;
pub mod store;
pub mod util;

pub use builder::SensorBuilder;
pub use config::{Limits, MonitorSettings, SensorSettings};
pub use error::{BuildError, CommandError, Result, SpcError};
pub use log::{LogEntry, LogRing, Severity};
pub use monitor::{Monitor, MonitorCycle};
pub use monitoring::MonitoringService;
pub use sensor::{SensorController, SensorState, SensorStatus};
pub use store::{CsvStore, MemoryStore};
