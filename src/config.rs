//! Cache configuration.
//!
//! [`Config`] uses builder-style setters and is consumed by
//! [`Cache::new`](crate::cache::Cache::new), which validates it. Sizing
//! options are hints: the per-shard byte queues start small and grow on
//! demand up to the hard cap.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use bytecache::config::Config;
//!
//! let config = Config::eviction(Duration::from_secs(600))
//!     .shards(64)
//!     .hard_max_cache_size_mb(256);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::hasher::{Fnv64a, Hasher};
use crate::stats::Metadata;

/// Every shard keeps room for at least this many entries.
const MIN_ENTRIES_IN_SHARD: usize = 10;

/// Why an entry was removed, reported to remove callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RemoveReason {
    /// The entry outlived the cache's life window.
    Expired = 1,
    /// The entry was the oldest and had to make room for a write.
    NoSpace = 2,
    /// The entry was removed by an explicit delete.
    Deleted = 3,
}

impl RemoveReason {
    pub(crate) fn filter_bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Callback receiving the removed key and value.
pub type OnRemoveFn = Box<dyn Fn(&str, &[u8]) + Send + Sync>;
/// Callback additionally receiving the [`RemoveReason`].
pub type OnRemoveWithReasonFn = Box<dyn Fn(&str, &[u8], RemoveReason) + Send + Sync>;
/// Callback additionally receiving the entry's [`Metadata`].
pub type OnRemoveWithMetadataFn = Box<dyn Fn(&str, &[u8], Metadata) + Send + Sync>;

/// The remove-callback shape selected at construction.
///
/// At most one callback fires per removal. When several are configured the
/// precedence is metadata, then plain, then with-reason; the reason filter
/// applies to the with-reason shape only.
pub(crate) enum RemoveCallback {
    None,
    Plain(OnRemoveFn),
    WithReason {
        callback: OnRemoveWithReasonFn,
        filter: u32,
    },
    WithMetadata(OnRemoveWithMetadataFn),
}

impl RemoveCallback {
    pub(crate) fn dispatch(&self, key: &str, value: &[u8], reason: RemoveReason, metadata: Metadata) {
        match self {
            RemoveCallback::None => {},
            RemoveCallback::Plain(callback) => callback(key, value),
            RemoveCallback::WithReason { callback, filter } => {
                if *filter == 0 || reason.filter_bit() & filter != 0 {
                    callback(key, value, reason);
                }
            },
            RemoveCallback::WithMetadata(callback) => callback(key, value, metadata),
        }
    }

    pub(crate) fn is_none(&self) -> bool {
        matches!(self, RemoveCallback::None)
    }
}

/// Configuration for [`Cache::new`](crate::cache::Cache::new).
pub struct Config {
    pub(crate) shards: usize,
    pub(crate) life_window: Duration,
    pub(crate) clean_window: Duration,
    pub(crate) max_entries_in_window: usize,
    pub(crate) max_entry_size: usize,
    pub(crate) hard_max_cache_size_mb: usize,
    pub(crate) verbose: bool,
    pub(crate) stats_enabled: bool,
    pub(crate) hasher: Arc<dyn Hasher>,
    pub(crate) on_remove: Option<OnRemoveFn>,
    pub(crate) on_remove_with_reason: Option<OnRemoveWithReasonFn>,
    pub(crate) on_remove_with_metadata: Option<OnRemoveWithMetadataFn>,
    pub(crate) on_remove_filter: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shards: 1024,
            life_window: Duration::ZERO,
            clean_window: Duration::ZERO,
            max_entries_in_window: 1000 * 10 * 60,
            max_entry_size: 500,
            hard_max_cache_size_mb: 0,
            verbose: false,
            stats_enabled: false,
            hasher: Arc::new(Fnv64a),
            on_remove: None,
            on_remove_with_reason: None,
            on_remove_with_metadata: None,
            on_remove_filter: 0,
        }
    }
}

impl Config {
    /// Default configuration with the given TTL and a one-second sweeper.
    pub fn eviction(life_window: Duration) -> Self {
        Self {
            life_window,
            clean_window: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Number of shards; must be a nonzero power of two.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Time after which an entry can be evicted. Zero disables TTL eviction.
    pub fn life_window(mut self, life_window: Duration) -> Self {
        self.life_window = life_window;
        self
    }

    /// Interval between background expiration sweeps. Zero disables the
    /// sweeper; expired entries are then only removed by write pressure.
    pub fn clean_window(mut self, clean_window: Duration) -> Self {
        self.clean_window = clean_window;
        self
    }

    /// Expected number of entries within one life window; a sizing hint for
    /// the initial shard capacity.
    pub fn max_entries_in_window(mut self, entries: usize) -> Self {
        self.max_entries_in_window = entries;
        self
    }

    /// Expected maximum entry size in bytes; sizes the encode scratch
    /// buffer and the initial queue capacity.
    pub fn max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    /// Hard cache size limit in MiB. Zero means unlimited; otherwise each
    /// shard's queue is capped at its even share and the oldest entries are
    /// dropped under pressure.
    pub fn hard_max_cache_size_mb(mut self, mib: usize) -> Self {
        self.hard_max_cache_size_mb = mib;
        self
    }

    /// Log queue reallocations and hash collisions through `tracing`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Track per-key request counts, readable via
    /// [`Cache::key_metadata`](crate::cache::Cache::key_metadata).
    pub fn stats_enabled(mut self, enabled: bool) -> Self {
        self.stats_enabled = enabled;
        self
    }

    /// Replaces the default FNV-1a key hasher.
    pub fn hasher(mut self, hasher: Arc<dyn Hasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Fires for every removed entry with its key and value.
    pub fn on_remove(mut self, callback: OnRemoveFn) -> Self {
        self.on_remove = Some(callback);
        self
    }

    /// Fires for every removed entry with the removal reason. Subject to
    /// [`Config::on_remove_filter`].
    pub fn on_remove_with_reason(mut self, callback: OnRemoveWithReasonFn) -> Self {
        self.on_remove_with_reason = Some(callback);
        self
    }

    /// Fires for every removed entry with its per-key metadata.
    pub fn on_remove_with_metadata(mut self, callback: OnRemoveWithMetadataFn) -> Self {
        self.on_remove_with_metadata = Some(callback);
        self
    }

    /// Restricts [`Config::on_remove_with_reason`] to the given reasons.
    /// An empty slice leaves all reasons enabled.
    pub fn on_remove_filter(mut self, reasons: &[RemoveReason]) -> Self {
        self.on_remove_filter = reasons
            .iter()
            .fold(0, |mask, reason| mask | reason.filter_bit());
        self
    }

    /// Initial per-shard entry capacity hint.
    pub(crate) fn initial_shard_size(&self) -> usize {
        (self.max_entries_in_window / self.shards.max(1)).max(MIN_ENTRIES_IN_SHARD)
    }

    /// Per-shard byte cap derived from the hard cache size. Zero when the
    /// cache is unbounded.
    pub(crate) fn maximum_shard_size_bytes(&self) -> usize {
        self.hard_max_cache_size_mb * 1024 * 1024 / self.shards.max(1)
    }

    /// Initial byte-queue capacity for one shard.
    pub(crate) fn initial_queue_capacity(&self) -> usize {
        let capacity = self.initial_shard_size() * self.max_entry_size;
        let cap = self.maximum_shard_size_bytes();
        if cap > 0 && capacity > cap {
            cap
        } else {
            capacity
        }
    }

    pub(crate) fn life_window_secs(&self) -> u64 {
        self.life_window.as_secs()
    }

    /// Consumes the configured callbacks into the single dispatched shape.
    pub(crate) fn take_remove_callback(&mut self) -> RemoveCallback {
        if let Some(callback) = self.on_remove_with_metadata.take() {
            RemoveCallback::WithMetadata(callback)
        } else if let Some(callback) = self.on_remove.take() {
            RemoveCallback::Plain(callback)
        } else if let Some(callback) = self.on_remove_with_reason.take() {
            RemoveCallback::WithReason {
                callback,
                filter: self.on_remove_filter,
            }
        } else {
            RemoveCallback::None
        }
    }
}
