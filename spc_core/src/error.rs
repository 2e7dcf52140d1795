use thiserror::Error;

use crate::sensor::SensorState;

/// Failures surfaced by the SPC engine outside of command rejection.
#[derive(Debug, Error, Clone)]
pub enum SpcError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unknown sensor '{0}'")]
    UnknownSensor(String),
    #[error("unknown simulator '{0}'")]
    UnknownSimulator(String),
    #[error("invalid sensor name '{0}'")]
    InvalidName(String),
}

/// A control-surface command that was refused; state is left untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("{sensor} must be ON to start measuring (currently {state})")]
    NotReady { sensor: String, state: SensorState },
    #[error("invalid control limits: ucl {ucl} must be >= lcl {lcl} and both finite")]
    InvalidLimits { ucl: f64, lcl: f64 },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing probe")]
    MissingProbe,
    #[error("missing measurement store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
