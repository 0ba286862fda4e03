//! Cache front: shard fan-out, background sweeper and the public API.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │ Cache                                                           │
//!   │                                                                 │
//!   │   key ──hasher──▶ h: u64 ──(h & shard_mask)──▶ shard            │
//!   │                                                                 │
//!   │   shards: Arc<[CacheShard]>    (N = 2^k, independent RwLocks)   │
//!   │   ┌─────────┬─────────┬─────────┬─────────┐                     │
//!   │   │ shard 0 │ shard 1 │   ...   │ shard N │                     │
//!   │   └─────────┴─────────┴─────────┴─────────┘                     │
//!   │        ▲                                                        │
//!   │        │ clean_up(now), one write lock at a time                │
//!   │   sweeper thread (condvar with clean_window timeout)            │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations on keys that land in different shards run fully in parallel;
//! operations within one shard serialize on its lock. The sweeper exits at
//! its next tick after [`Cache::close`] is signaled.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CacheError, ConfigError};
use crate::hasher::Hasher;
use crate::iterator::EntryIterator;
use crate::shard::CacheShard;
use crate::stats::{Metadata, Stats};

/// Additional lookup information returned by [`Cache::get_with_info`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// The entry has outlived the life window but has not been evicted yet.
    pub expired: bool,
}

struct Shutdown {
    flag: Mutex<bool>,
    condvar: Condvar,
}

/// Concurrent, sharded, evicting key-value cache for byte values.
///
/// Entries live as flat records on per-shard byte buffers; the cache never
/// holds one heap allocation per entry. Eviction is insertion order plus an
/// optional TTL. See [`Config`] for tuning.
///
/// # Example
///
/// ```
/// use bytecache::cache::Cache;
/// use bytecache::config::Config;
///
/// let config = Config::default()
///     .shards(16)
///     .max_entries_in_window(10_000)
///     .max_entry_size(256);
/// let cache = Cache::new(config).unwrap();
/// cache.set("greeting", b"hello").unwrap();
/// assert_eq!(cache.get("greeting").unwrap(), b"hello");
/// ```
pub struct Cache {
    shards: Arc<[CacheShard]>,
    shard_mask: u64,
    hasher: Arc<dyn Hasher>,
    shutdown: Arc<Shutdown>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Cache {
    /// Builds a cache from `config` using the system clock.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds a cache with an injected time source. Entry timestamps and
    /// TTL checks go through `clock`, which lets tests advance time
    /// deterministically.
    pub fn with_clock(mut config: Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if config.shards == 0 || !config.shards.is_power_of_two() {
            return Err(ConfigError::new("shards number must be a power of two"));
        }

        let hasher = config.hasher.clone();
        let on_remove = Arc::new(config.take_remove_callback());
        let shards: Arc<[CacheShard]> = (0..config.shards)
            .map(|_| CacheShard::new(&config, on_remove.clone(), clock.clone()))
            .collect::<Vec<_>>()
            .into();

        let shutdown = Arc::new(Shutdown {
            flag: Mutex::new(false),
            condvar: Condvar::new(),
        });

        let sweeper = if config.clean_window > Duration::ZERO {
            let shards = shards.clone();
            let shutdown = shutdown.clone();
            let clock = clock.clone();
            let clean_window = config.clean_window;
            let handle = thread::Builder::new()
                .name("bytecache-sweeper".into())
                .spawn(move || sweeper_loop(&shards, &shutdown, &*clock, clean_window))
                .map_err(|err| ConfigError::new(format!("failed to spawn sweeper: {err}")))?;
            Some(handle)
        } else {
            None
        };

        Ok(Self {
            shards,
            shard_mask: (config.shards - 1) as u64,
            hasher,
            shutdown,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Reads the entry stored under `key`.
    ///
    /// Returns [`CacheError::EntryNotFound`] when no entry exists. Expiry
    /// is deliberately not checked here: an entry past its life window is
    /// served until eviction reclaims it. Use [`Cache::get_with_info`] to
    /// observe expiry.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).get(key, hashed_key)
    }

    /// Reads the entry together with its expiry status.
    pub fn get_with_info(&self, key: &str) -> Result<(Vec<u8>, Response), CacheError> {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).get_with_info(key, hashed_key)
    }

    /// Stores `value` under `key`, evicting older entries if needed.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).set(key, hashed_key, value)
    }

    /// Appends `value` to the entry under `key`, creating it when absent.
    /// Concatenates multiple writes under one key without a read-modify-
    /// write round trip at the call site.
    pub fn append(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).append(key, hashed_key, value)
    }

    /// Removes the entry stored under `key`.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).delete(hashed_key)
    }

    /// Empties every shard. Capacity hints are restored; allocated queue
    /// buffers are kept.
    pub fn reset(&self) {
        for shard in self.shards.iter() {
            shard.reset();
        }
    }

    /// Number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(CacheShard::len).sum()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.len() == 0)
    }

    /// Number of bytes allocated across all shard queues.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(CacheShard::capacity).sum()
    }

    /// Aggregated statistics across all shards.
    pub fn stats(&self) -> Stats {
        let mut total = Stats::default();
        for shard in self.shards.iter() {
            let stats = shard.stats();
            total.hits += stats.hits;
            total.misses += stats.misses;
            total.del_hits += stats.del_hits;
            total.del_misses += stats.del_misses;
            total.collisions += stats.collisions;
        }
        total
    }

    /// Per-key request count, tracked when `stats_enabled` is configured.
    pub fn key_metadata(&self, key: &str) -> Metadata {
        let hashed_key = self.hasher.sum64(key);
        self.shard(hashed_key).key_metadata(hashed_key)
    }

    /// Iterates over all entries. Each shard's key set is snapshotted under
    /// its read lock when iteration reaches it; entry reads are live, so
    /// entries removed mid-iteration are skipped.
    pub fn iter(&self) -> EntryIterator<'_> {
        EntryIterator::new(self)
    }

    /// Signals the sweeper to exit and waits for it. Idempotent; also runs
    /// on drop. Cache operations remain usable afterwards, but expired
    /// entries are no longer swept in the background.
    pub fn close(&self) {
        {
            let mut flag = self.shutdown.flag.lock();
            *flag = true;
        }
        self.shutdown.condvar.notify_all();
        if let Some(handle) = self.sweeper.lock().take() {
            let _ = handle.join();
        }
    }

    fn shard(&self, hashed_key: u64) -> &CacheShard {
        &self.shards[(hashed_key & self.shard_mask) as usize]
    }

    pub(crate) fn shard_at(&self, index: usize) -> &CacheShard {
        &self.shards[index]
    }

    pub(crate) fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.close();
    }
}

fn sweeper_loop(
    shards: &[CacheShard],
    shutdown: &Shutdown,
    clock: &dyn Clock,
    clean_window: Duration,
) {
    debug!(clean_window_ms = clean_window.as_millis() as u64, "sweeper started");
    let mut flag = shutdown.flag.lock();
    loop {
        if *flag {
            break;
        }
        shutdown.condvar.wait_for(&mut flag, clean_window);
        if *flag {
            break;
        }
        MutexGuard::unlocked(&mut flag, || {
            let now = clock.epoch_secs();
            for shard in shards {
                shard.clean_up(now);
            }
        });
    }
    debug!("sweeper stopped");
}
