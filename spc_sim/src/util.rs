use std::time::{Duration, Instant};

pub use spc_traits::clock::{SLEEP_SLICE, sleep_while};

use crate::error::{Result, SimError};

/// Wait until `done` returns true, or a timeout expires. Sleeps in small
/// intervals to avoid CPU spinning.
pub fn wait_until(
    mut done: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !done() {
        if Instant::now() >= deadline {
            return Err(SimError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Round to two decimal places, half away from zero.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_matches_display_precision() {
        assert_eq!(round2(50.456), 50.46);
        assert_eq!(round2(-1.234), -1.23);
        assert_eq!(round2(0.2), 0.2);
    }
}
