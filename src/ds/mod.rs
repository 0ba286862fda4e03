pub mod bytes_queue;

pub use bytes_queue::{BytesQueue, QueueError};
