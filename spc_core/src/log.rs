//! Per-sensor operator log: a bounded ring of structured entries.
//!
//! Entries are rendered to text only at the boundary (`Display`), so callers
//! can filter by severity without parsing strings.
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

use crate::util::display_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "WARNING: {}", self.message),
            Severity::Info | Severity::Error => {
                write!(f, "{}: {}", display_ts(self.timestamp), self.message)
            }
        }
    }
}

/// Fixed-capacity log; the oldest entry is evicted once full.
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRing {
    pub const DEFAULT_CAPACITY: usize = 500;

    /// A capacity of 0 is bumped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Rendered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    /// Most recent warning among the last `lookback` entries.
    pub fn latest_warning(&self, lookback: usize) -> Option<&LogEntry> {
        self.entries
            .iter()
            .rev()
            .take(lookback)
            .find(|e| e.severity == Severity::Warning)
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
