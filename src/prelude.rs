pub use crate::cache::{Cache, Response};
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{Config, RemoveReason};
pub use crate::error::{CacheError, ConfigError};
pub use crate::hasher::{Fnv64a, Hasher};
pub use crate::iterator::{EntryInfo, EntryIterator};
pub use crate::stats::{Metadata, Stats};
