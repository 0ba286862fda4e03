//! Time source for entry timestamps and TTL checks.
//!
//! The cache only needs whole seconds since the Unix epoch. Keeping the
//! source behind a trait lets tests advance time deterministically instead
//! of sleeping through life windows.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as integer seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn epoch_secs(&self) -> u64;
}

/// Wall-clock backed [`Clock`] used outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_current_epoch() {
        let now = SystemClock.epoch_secs();
        // Sanity bound: past 2020, before 2100.
        assert!(now > 1_577_836_800);
        assert!(now < 4_102_444_800);
    }
}
