pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock, sleep_while};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Boxed error returned across the device and storage seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One raw value as produced by a device, before ingestion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub generated_at: DateTime<Utc>,
}

/// One accepted sample. `logged_at >= measured_at` always holds for
/// measurements built by a sensor controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    #[serde(rename = "timestamp_measured")]
    pub measured_at: DateTime<Utc>,
    #[serde(rename = "timestamp_logged")]
    pub logged_at: DateTime<Utc>,
}

/// Source of raw readings for a sensor (the device output register).
///
/// `Ok(None)` means nothing is pending; `Err` means the payload could not be
/// interpreted.
pub trait Probe {
    fn read(&self) -> Result<Option<Reading>, BoxError>;
}

/// Durable home for accepted measurements.
pub trait MeasurementStore {
    fn append(&self, sensor: &str, measurement: &Measurement) -> Result<(), BoxError>;

    /// Measurements with `measured_at >= since`, ascending by `measured_at`.
    fn query_window(&self, sensor: &str, since: DateTime<Utc>)
    -> Result<Vec<Measurement>, BoxError>;
}
