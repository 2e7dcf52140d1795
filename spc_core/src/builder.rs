//! Type-state builder for `SensorController`.
//!
//! The builder enforces at compile time that a probe and a store are provided
//! before `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use spc_traits::{Clock, MeasurementStore, Probe, SystemClock};

use crate::config::{Limits, SensorSettings};
use crate::error::{BuildError, Result};
use crate::sensor::SensorController;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `SensorController`. Settings are validated on `build()`.
pub struct SensorBuilder<P, S> {
    name: String,
    probe: Option<Arc<dyn Probe + Send + Sync>>,
    store: Option<Arc<dyn MeasurementStore + Send + Sync>>,
    settings: SensorSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _p: PhantomData<P>,
    _s: PhantomData<S>,
}

impl SensorBuilder<Missing, Missing> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            probe: None,
            store: None,
            settings: SensorSettings::default(),
            clock: None,
            _p: PhantomData,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<P, S> SensorBuilder<P, S> {
    pub fn with_settings(mut self, settings: SensorSettings) -> Self {
        self.settings = settings;
        self
    }
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.settings.limits = limits;
        self
    }
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.settings.verbose = verbose;
        self
    }
    /// Provide a custom clock implementation; defaults to `SystemClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<SensorController> {
        let probe = self
            .probe
            .ok_or_else(|| eyre::Report::new(BuildError::MissingProbe))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;

        if !spc_config::is_valid_sensor_name(&self.name) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor name may only contain letters, digits, '_' and '-'",
            )));
        }
        if self.settings.period.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sampling period must be > 0",
            )));
        }
        if self.settings.log_capacity == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "log capacity must be >= 1",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(SystemClock::new()),
        };
        Ok(SensorController::from_parts(
            self.name,
            self.settings,
            clock,
            probe,
            store,
        ))
    }
}

// Setters that advance type-state
impl<S> SensorBuilder<Missing, S> {
    pub fn with_probe(self, probe: Arc<dyn Probe + Send + Sync>) -> SensorBuilder<Set, S> {
        SensorBuilder {
            name: self.name,
            probe: Some(probe),
            store: self.store,
            settings: self.settings,
            clock: self.clock,
            _p: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<P> SensorBuilder<P, Missing> {
    pub fn with_store(
        self,
        store: Arc<dyn MeasurementStore + Send + Sync>,
    ) -> SensorBuilder<P, Set> {
        SensorBuilder {
            name: self.name,
            probe: self.probe,
            store: Some(store),
            settings: self.settings,
            clock: self.clock,
            _p: PhantomData,
            _s: PhantomData,
        }
    }
}

impl SensorBuilder<Set, Set> {
    /// Validate and build the sensor. Only available when probe and store are set.
    pub fn build(self) -> Result<SensorController> {
        self.try_build()
    }
}
