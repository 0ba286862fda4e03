//! Error types for the bytecache library.
//!
//! [`CacheError`] covers the runtime surface (lookups, writes), while
//! [`ConfigError`] is returned by fallible construction when configuration
//! parameters fail validation.

use std::fmt;

use crate::ds::bytes_queue::QueueError;

/// Error returned by cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// No entry exists for the key, or another key occupies the same hash.
    EntryNotFound,
    /// The entry does not fit in its shard even after draining the queue.
    EntryTooLarge,
    /// An internal queue error surfaced through a cache operation. Outside
    /// of [`QueueError::Full`] recovery these indicate index staleness and
    /// are reported rather than panicked over.
    Queue(QueueError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::EntryNotFound => f.write_str("entry not found"),
            CacheError::EntryTooLarge => f.write_str("entry is bigger than max shard size"),
            CacheError::Queue(err) => write!(f, "bytes queue error: {err}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Queue(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueueError> for CacheError {
    fn from(err: QueueError) -> Self {
        CacheError::Queue(err)
    }
}

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`Cache::new`](crate::cache::Cache::new). Carries a
/// human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}
