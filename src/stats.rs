//! Aggregated cache statistics.

/// Counter snapshot aggregated across all shards.
///
/// Counters are maintained with relaxed atomics outside the shard locks, so
/// a snapshot may lag in-flight operations; it is monotonic per counter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stats {
    /// Number of successfully found keys.
    pub hits: u64,
    /// Number of not found keys.
    pub misses: u64,
    /// Number of successfully deleted keys.
    #[cfg_attr(feature = "serde", serde(rename = "delete_hits"))]
    pub del_hits: u64,
    /// Number of deletes for absent keys.
    #[cfg_attr(feature = "serde", serde(rename = "delete_misses"))]
    pub del_misses: u64,
    /// Number of detected key collisions.
    pub collisions: u64,
}

/// Per-key bookkeeping, available when `stats_enabled` is set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Metadata {
    /// Number of times the key was requested.
    pub request_count: u32,
}
