//! Single-slot handoff between a simulator and its sensor.
//!
//! Writes overwrite whatever is pending and reads never consume. The slot is
//! emptied only by the producer's own clear timer, so a reader may see the same
//! reading twice or miss one entirely. Value and timestamp sit behind one lock
//! and are always observed together.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use spc_traits::{BoxError, Probe, Reading};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SimError;

#[derive(Debug, Default)]
pub struct DataChannel {
    slot: Mutex<Option<Reading>>,
    writes: AtomicU64,
}

impl DataChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending payload.
    pub fn write(&self, value: f64, generated_at: DateTime<Utc>) {
        *self.slot.lock() = Some(Reading {
            value,
            generated_at,
        });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Current payload without any validation.
    pub fn peek(&self) -> Option<Reading> {
        *self.slot.lock()
    }

    /// Total number of writes since construction.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Probe for DataChannel {
    fn read(&self) -> Result<Option<Reading>, BoxError> {
        match self.peek() {
            Some(r) if !r.value.is_finite() => Err(Box::new(SimError::MalformedReading(r.value))),
            other => Ok(other),
        }
    }
}
