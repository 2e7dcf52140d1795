//! Test and helper mocks for spc_core

use parking_lot::Mutex;
use spc_traits::{BoxError, Measurement, MeasurementStore, Probe, Reading};
use std::collections::VecDeque;

/// A probe that replays a fixed script of read results, then reports nothing
/// pending forever.
#[derive(Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<Option<Reading>, BoxError>>>,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = Result<Option<Reading>, BoxError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl Probe for ScriptedProbe {
    fn read(&self) -> Result<Option<Reading>, BoxError> {
        self.script.lock().pop_front().unwrap_or(Ok(None))
    }
}

/// A store that rejects every write and every query.
pub struct FailingStore;

impl MeasurementStore for FailingStore {
    fn append(&self, _sensor: &str, _m: &Measurement) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("store offline")))
    }

    fn query_window(
        &self,
        _sensor: &str,
        _since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Measurement>, BoxError> {
        Err(Box::new(std::io::Error::other("store offline")))
    }
}
