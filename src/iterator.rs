//! Iteration over cache entries.
//!
//! The iterator walks shards in order. Reaching a shard snapshots its
//! hashed keys under that shard's read lock; the entries themselves are
//! then read live, one lock acquisition per entry, so keys removed or
//! overwritten after the snapshot are simply skipped. No shard lock is held
//! between `next` calls.

use crate::cache::Cache;

/// One cache entry produced by [`Cache::iter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub(crate) timestamp: u64,
    pub(crate) hash: u64,
    pub(crate) key: String,
    pub(crate) value: Vec<u8>,
}

impl EntryInfo {
    /// Seconds since epoch at which the entry was written.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The entry's 64-bit key hash.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The entry's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consumes the info, returning the owned value bytes.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}

/// Iterator over all cache entries; see [`Cache::iter`].
pub struct EntryIterator<'a> {
    cache: &'a Cache,
    shard_index: usize,
    keys: Vec<u64>,
    position: usize,
}

impl<'a> EntryIterator<'a> {
    pub(crate) fn new(cache: &'a Cache) -> Self {
        let keys = cache.shard_at(0).copy_hashed_keys();
        Self {
            cache,
            shard_index: 0,
            keys,
            position: 0,
        }
    }
}

impl Iterator for EntryIterator<'_> {
    type Item = EntryInfo;

    fn next(&mut self) -> Option<EntryInfo> {
        loop {
            if self.position < self.keys.len() {
                let hashed_key = self.keys[self.position];
                self.position += 1;
                match self.cache.shard_at(self.shard_index).entry_info(hashed_key) {
                    Some(info) => return Some(info),
                    None => continue,
                }
            }
            self.shard_index += 1;
            if self.shard_index >= self.cache.shard_count() {
                return None;
            }
            self.keys = self.cache.shard_at(self.shard_index).copy_hashed_keys();
            self.position = 0;
        }
    }
}
