#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytecache::clock::Clock;
use bytecache::hasher::Hasher;

/// Deterministic clock advanced explicitly by tests.
pub struct MockClock(AtomicU64);

impl MockClock {
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for MockClock {
    fn epoch_secs(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Maps every key to the same hash, forcing collisions.
pub struct ConstHasher(pub u64);

impl Hasher for ConstHasher {
    fn sum64(&self, _key: &str) -> u64 {
        self.0
    }
}

/// Hashes the decimal prefix of `"<n>:<rest>"` keys to `n`, giving tests
/// direct control over shard routing.
pub struct PrefixHasher;

impl Hasher for PrefixHasher {
    fn sum64(&self, key: &str) -> u64 {
        key.split(':')
            .next()
            .and_then(|prefix| prefix.parse().ok())
            .unwrap_or(0)
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
