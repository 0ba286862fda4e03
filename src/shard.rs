//! One cache shard: a locked pairing of offset map and byte queue.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │ CacheShard                                                    │
//!   │                                                               │
//!   │   RwLock<ShardInner>                  ShardCounters (atomic)  │
//!   │   ┌───────────────────────────────┐   hits / misses /         │
//!   │   │ index: FxHashMap<u64, u32>    │   del_hits / del_misses / │
//!   │   │        key hash -> record idx │   collisions              │
//!   │   │ entries: BytesQueue           │                           │
//!   │   │ buffer: encode scratch        │                           │
//!   │   │ key_hits: per-key counters    │                           │
//!   │   └───────────────────────────────┘                           │
//!   └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take the read lock and copy the value out before releasing it.
//! Writes take the write lock and run the eviction protocol inline: the
//! expired oldest entry is dropped on every write, and a full queue is
//! drained from the head until the new record fits. A record overwritten
//! under the same hash is tombstoned in place (hash field zeroed) and
//! reclaimed when it reaches the queue head.
//!
//! Counters live outside the lock and are updated with relaxed atomics, so
//! statistics may lag the locked state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cache::Response;
use crate::clock::Clock;
use crate::config::{Config, RemoveCallback, RemoveReason};
use crate::ds::bytes_queue::{BytesQueue, QueueError};
use crate::entry;
use crate::error::CacheError;
use crate::iterator::EntryInfo;
use crate::stats::{Metadata, Stats};

#[derive(Debug, Default)]
struct ShardCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    del_hits: AtomicU64,
    del_misses: AtomicU64,
    collisions: AtomicU64,
}

struct ShardInner {
    index: FxHashMap<u64, u32>,
    entries: BytesQueue,
    buffer: Vec<u8>,
    key_hits: FxHashMap<u64, u32>,
}

pub(crate) struct CacheShard {
    inner: RwLock<ShardInner>,
    counters: ShardCounters,
    life_window: u64,
    stats_enabled: bool,
    verbose: bool,
    clock: Arc<dyn Clock>,
    on_remove: Arc<RemoveCallback>,
    initial_map_capacity: usize,
    scratch_capacity: usize,
}

/// Timestamp of the oldest record; fillers (payloads shorter than the
/// record header) read as zero so they age out with the head.
fn oldest_timestamp(oldest: &[u8]) -> u64 {
    if oldest.len() < entry::HEADERS_SIZE {
        0
    } else {
        entry::timestamp(oldest)
    }
}

impl CacheShard {
    pub(crate) fn new(
        config: &Config,
        on_remove: Arc<RemoveCallback>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial_map_capacity = config.initial_shard_size();
        let scratch_capacity = config.max_entry_size + entry::HEADERS_SIZE;
        Self {
            inner: RwLock::new(ShardInner {
                index: FxHashMap::with_capacity_and_hasher(initial_map_capacity, Default::default()),
                entries: BytesQueue::new(
                    config.initial_queue_capacity(),
                    config.maximum_shard_size_bytes(),
                    config.verbose,
                ),
                buffer: vec![0; scratch_capacity],
                key_hits: FxHashMap::default(),
            }),
            counters: ShardCounters::default(),
            life_window: config.life_window_secs(),
            stats_enabled: config.stats_enabled,
            verbose: config.verbose,
            clock,
            on_remove,
            initial_map_capacity,
            scratch_capacity,
        }
    }

    /// Returns a copy of the value stored under `key`.
    ///
    /// Expiry is not checked here: an entry past its life window stays
    /// readable until eviction reclaims it. Use
    /// [`CacheShard::get_with_info`] to observe expiry.
    pub(crate) fn get(&self, key: &str, hashed_key: u64) -> Result<Vec<u8>, CacheError> {
        let value = {
            let inner = self.inner.read();
            let wrapped = self.wrapped_entry(&inner, hashed_key)?;
            if !entry::key_matches(wrapped, key) {
                self.collision(key, wrapped, hashed_key);
                return Err(CacheError::EntryNotFound);
            }
            entry::value(wrapped)
        };
        self.hit(hashed_key);
        Ok(value)
    }

    /// Like [`CacheShard::get`], also reporting whether the entry has
    /// outlived the life window.
    pub(crate) fn get_with_info(
        &self,
        key: &str,
        hashed_key: u64,
    ) -> Result<(Vec<u8>, Response), CacheError> {
        let current = self.clock.epoch_secs();
        let (value, timestamp) = {
            let inner = self.inner.read();
            let wrapped = self.wrapped_entry(&inner, hashed_key)?;
            if !entry::key_matches(wrapped, key) {
                self.collision(key, wrapped, hashed_key);
                return Err(CacheError::EntryNotFound);
            }
            (entry::value(wrapped), entry::timestamp(wrapped))
        };
        self.hit(hashed_key);
        let expired =
            self.life_window > 0 && current.saturating_sub(timestamp) >= self.life_window;
        Ok((value, Response { expired }))
    }

    /// Stores `value` under the key, evicting as needed to make room.
    pub(crate) fn set(&self, key: &str, hashed_key: u64, value: &[u8]) -> Result<(), CacheError> {
        let current = self.clock.epoch_secs();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(previous) = inner.index.get(&hashed_key).copied() {
            if let Ok(previous_entry) = inner.entries.get_mut(previous as usize) {
                entry::reset_hash(previous_entry);
            }
        }

        self.evict_if_expired(inner, current);

        let len = entry::wrap_into(current, hashed_key, key, value, &mut inner.buffer);
        self.push_indexed(inner, hashed_key, len)
    }

    /// Appends `extra` to the value stored under the key, or behaves like
    /// [`CacheShard::set`] when the key is absent.
    pub(crate) fn append(&self, key: &str, hashed_key: u64, extra: &[u8]) -> Result<(), CacheError> {
        let current = self.clock.epoch_secs();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        match self.locate_valid(inner, key, hashed_key)? {
            Some(index) => {
                let len = {
                    let wrapped = inner.entries.get(index).map_err(CacheError::from)?;
                    entry::append_into(current, wrapped, extra, &mut inner.buffer)
                };
                if let Ok(previous_entry) = inner.entries.get_mut(index) {
                    entry::reset_hash(previous_entry);
                }
                self.evict_if_expired(inner, current);
                self.push_indexed(inner, hashed_key, len)
            },
            None => {
                self.evict_if_expired(inner, current);
                let len = entry::wrap_into(current, hashed_key, key, extra, &mut inner.buffer);
                self.push_indexed(inner, hashed_key, len)
            },
        }
    }

    /// Removes the entry stored under the hash.
    ///
    /// An optimistic read-locked precheck keeps misses cheap; the write
    /// lock re-validates because the world may have changed in between.
    pub(crate) fn delete(&self, hashed_key: u64) -> Result<(), CacheError> {
        {
            let inner = self.inner.read();
            let index = match inner.index.get(&hashed_key).copied() {
                None => {
                    self.del_miss();
                    return Err(CacheError::EntryNotFound);
                },
                Some(index) => index,
            };
            if let Err(err) = inner.entries.check_get(index as usize) {
                self.del_miss();
                return Err(err.into());
            }
        }

        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;

            let index = match inner.index.get(&hashed_key).copied() {
                None => {
                    self.del_miss();
                    return Err(CacheError::EntryNotFound);
                },
                Some(index) => index as usize,
            };
            let wrapped = match inner.entries.get(index) {
                Ok(wrapped) => wrapped.to_vec(),
                Err(err) => {
                    self.del_miss();
                    return Err(err.into());
                },
            };

            inner.index.remove(&hashed_key);
            self.fire_remove(inner, &wrapped, RemoveReason::Deleted);
            if self.stats_enabled {
                inner.key_hits.remove(&hashed_key);
            }
            if let Ok(entry_bytes) = inner.entries.get_mut(index) {
                entry::reset_hash(entry_bytes);
            }
        }

        self.del_hit();
        Ok(())
    }

    /// Pops expired records from the head until a live one remains.
    pub(crate) fn clean_up(&self, current: u64) {
        if self.life_window == 0 {
            return;
        }
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        loop {
            let oldest_ts = match inner.entries.peek() {
                Ok(oldest) => oldest_timestamp(oldest),
                Err(_) => break,
            };
            if current.saturating_sub(oldest_ts) <= self.life_window {
                break;
            }
            if self.remove_oldest(inner, RemoveReason::Expired).is_err() {
                break;
            }
        }
    }

    /// Drops every entry and restores initial capacity hints.
    pub(crate) fn reset(&self) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.index = FxHashMap::with_capacity_and_hasher(
            self.initial_map_capacity,
            Default::default(),
        );
        inner.key_hits = FxHashMap::default();
        inner.buffer = vec![0; self.scratch_capacity];
        inner.entries.reset();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.inner.read().entries.capacity()
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            del_hits: self.counters.del_hits.load(Ordering::Relaxed),
            del_misses: self.counters.del_misses.load(Ordering::Relaxed),
            collisions: self.counters.collisions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn key_metadata(&self, hashed_key: u64) -> Metadata {
        Metadata {
            request_count: self
                .inner
                .read()
                .key_hits
                .get(&hashed_key)
                .copied()
                .unwrap_or(0),
        }
    }

    /// Hashed keys currently indexed, copied under the read lock.
    pub(crate) fn copy_hashed_keys(&self) -> Vec<u64> {
        self.inner.read().index.keys().copied().collect()
    }

    /// Live read of one entry for iteration; `None` when the entry has
    /// been removed or tombstoned since the key snapshot was taken.
    pub(crate) fn entry_info(&self, hashed_key: u64) -> Option<EntryInfo> {
        let inner = self.inner.read();
        let index = inner.index.get(&hashed_key).copied()?;
        let wrapped = inner.entries.get(index as usize).ok()?;
        if entry::hash(wrapped) != hashed_key {
            return None;
        }
        Some(EntryInfo {
            timestamp: entry::timestamp(wrapped),
            hash: hashed_key,
            key: entry::key(wrapped),
            value: entry::value(wrapped),
        })
    }

    /// Resolves the hash to its record, counting a miss on failure.
    fn wrapped_entry<'a>(
        &self,
        inner: &'a ShardInner,
        hashed_key: u64,
    ) -> Result<&'a [u8], CacheError> {
        let index = match inner.index.get(&hashed_key).copied() {
            None => {
                self.miss();
                return Err(CacheError::EntryNotFound);
            },
            Some(index) => index as usize,
        };
        match inner.entries.get(index) {
            Ok(wrapped) => Ok(wrapped),
            Err(err) => {
                self.miss();
                Err(err.into())
            },
        }
    }

    /// Write-locked lookup that validates the stored key bytes. Returns
    /// `None` for both absence and collision, mirroring the read path.
    fn locate_valid(
        &self,
        inner: &mut ShardInner,
        key: &str,
        hashed_key: u64,
    ) -> Result<Option<usize>, CacheError> {
        let index = match inner.index.get(&hashed_key).copied() {
            None => {
                self.miss();
                return Ok(None);
            },
            Some(index) => index as usize,
        };
        let wrapped = match inner.entries.get(index) {
            Ok(wrapped) => wrapped,
            Err(err) => {
                self.miss();
                return Err(err.into());
            },
        };
        if !entry::key_matches(wrapped, key) {
            self.collision(key, wrapped, hashed_key);
            return Ok(None);
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        if self.stats_enabled {
            *inner.key_hits.entry(hashed_key).or_insert(0) += 1;
        }
        Ok(Some(index))
    }

    /// Pushes the record staged in the scratch buffer, evicting from the
    /// head until it fits, and indexes it under the hash.
    fn push_indexed(
        &self,
        inner: &mut ShardInner,
        hashed_key: u64,
        len: usize,
    ) -> Result<(), CacheError> {
        loop {
            match inner.entries.push(&inner.buffer[..len]) {
                Ok(index) => {
                    inner.index.insert(hashed_key, index as u32);
                    return Ok(());
                },
                Err(_) => {
                    if self.remove_oldest(inner, RemoveReason::NoSpace).is_err() {
                        return Err(CacheError::EntryTooLarge);
                    }
                },
            }
        }
    }

    /// Evicts the head record when it has outlived the life window.
    fn evict_if_expired(&self, inner: &mut ShardInner, current: u64) {
        if self.life_window == 0 {
            return;
        }
        let oldest_ts = match inner.entries.peek() {
            Ok(oldest) => oldest_timestamp(oldest),
            Err(_) => return,
        };
        if current.saturating_sub(oldest_ts) > self.life_window {
            let _ = self.remove_oldest(inner, RemoveReason::Expired);
        }
    }

    /// Pops the head record. Tombstones and fillers are reclaimed silently;
    /// live records are unindexed and reported to the remove callback.
    fn remove_oldest(&self, inner: &mut ShardInner, reason: RemoveReason) -> Result<(), QueueError> {
        let oldest = inner.entries.pop()?;
        if oldest.len() < entry::HEADERS_SIZE {
            return Ok(());
        }
        let hash = entry::hash(&oldest);
        if hash == 0 {
            return Ok(());
        }
        inner.index.remove(&hash);
        self.fire_remove(inner, &oldest, reason);
        if self.stats_enabled {
            inner.key_hits.remove(&hash);
        }
        Ok(())
    }

    fn fire_remove(&self, inner: &ShardInner, wrapped: &[u8], reason: RemoveReason) {
        if self.on_remove.is_none() {
            return;
        }
        let metadata = Metadata {
            request_count: inner
                .key_hits
                .get(&entry::hash(wrapped))
                .copied()
                .unwrap_or(0),
        };
        self.on_remove
            .dispatch(&entry::key(wrapped), &entry::value(wrapped), reason, metadata);
    }

    fn hit(&self, hashed_key: u64) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        if self.stats_enabled {
            *self
                .inner
                .write()
                .key_hits
                .entry(hashed_key)
                .or_insert(0) += 1;
        }
    }

    fn miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn del_hit(&self) {
        self.counters.del_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn del_miss(&self) {
        self.counters.del_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn collision(&self, key: &str, stored: &[u8], hashed_key: u64) {
        self.counters.collisions.fetch_add(1, Ordering::Relaxed);
        if self.verbose {
            debug!(
                key,
                stored_key = %entry::key(stored),
                hash = hashed_key,
                "collision detected, both keys share one hash"
            );
        }
    }
}
