//! Common time helpers for spc_core.
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Text form of timestamps in operator-facing messages.
pub const DISPLAY_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[inline]
pub fn display_ts(ts: DateTime<Utc>) -> String {
    ts.format(DISPLAY_TS_FORMAT).to_string()
}

/// Ingestion time for a reading generated at `measured_at` and picked up at
/// `now`. Clamped so it never precedes generation, even across clock skew.
#[inline]
pub fn logged_at(now: DateTime<Utc>, measured_at: DateTime<Utc>) -> DateTime<Utc> {
    now.max(measured_at)
}

/// Start of a look-back window ending at `now`.
/// - Saturates at the earliest representable time for absurd windows.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
