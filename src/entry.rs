//! Record codec for cache entries.
//!
//! Every cache entry is serialized as one flat record, stored behind a
//! length prefix inside the shard's byte queue:
//!
//! ```text
//!   offset  size  field
//!   0       8     timestamp (seconds, little endian)
//!   8       8     key hash  (u64, little endian)
//!   16      2     key length L (u16, little endian)
//!   18      L     key bytes (UTF-8)
//!   18+L    V     value bytes
//! ```
//!
//! Records are encoded into a reusable scratch buffer owned by the shard;
//! the `*_into` functions return the encoded length rather than a slice so
//! the caller can keep borrowing other shard fields while the record sits
//! in the scratch space. Readers that hand data out (`key`, `value`) copy,
//! because the backing buffer may be rewritten as soon as the shard lock is
//! released.

const TIMESTAMP_SIZE: usize = 8;
const HASH_SIZE: usize = 8;
const KEY_LEN_SIZE: usize = 2;

/// Total fixed header size of a record.
pub(crate) const HEADERS_SIZE: usize = TIMESTAMP_SIZE + HASH_SIZE + KEY_LEN_SIZE;

/// Encodes a record into `scratch`, growing it as needed.
///
/// Returns the encoded length; the record occupies `scratch[..len]`.
pub(crate) fn wrap_into(
    timestamp: u64,
    hash: u64,
    key: &str,
    value: &[u8],
    scratch: &mut Vec<u8>,
) -> usize {
    let key_len = key.len();
    let blob_len = HEADERS_SIZE + key_len + value.len();
    if scratch.len() < blob_len {
        scratch.resize(blob_len, 0);
    }

    scratch[..TIMESTAMP_SIZE].copy_from_slice(&timestamp.to_le_bytes());
    scratch[TIMESTAMP_SIZE..TIMESTAMP_SIZE + HASH_SIZE].copy_from_slice(&hash.to_le_bytes());
    scratch[TIMESTAMP_SIZE + HASH_SIZE..HEADERS_SIZE]
        .copy_from_slice(&(key_len as u16).to_le_bytes());
    scratch[HEADERS_SIZE..HEADERS_SIZE + key_len].copy_from_slice(key.as_bytes());
    scratch[HEADERS_SIZE + key_len..blob_len].copy_from_slice(value);

    blob_len
}

/// Builds a new record from an existing one with `extra` appended to its
/// value and the timestamp refreshed. Hash, key length and key bytes are
/// carried over unchanged.
///
/// Returns the encoded length; the record occupies `scratch[..len]`.
pub(crate) fn append_into(
    timestamp: u64,
    wrapped: &[u8],
    extra: &[u8],
    scratch: &mut Vec<u8>,
) -> usize {
    let blob_len = wrapped.len() + extra.len();
    if scratch.len() < blob_len {
        scratch.resize(blob_len, 0);
    }

    scratch[..TIMESTAMP_SIZE].copy_from_slice(&timestamp.to_le_bytes());
    scratch[TIMESTAMP_SIZE..wrapped.len()].copy_from_slice(&wrapped[TIMESTAMP_SIZE..]);
    scratch[wrapped.len()..blob_len].copy_from_slice(extra);

    blob_len
}

pub(crate) fn timestamp(wrapped: &[u8]) -> u64 {
    u64::from_le_bytes(wrapped[..TIMESTAMP_SIZE].try_into().unwrap())
}

pub(crate) fn hash(wrapped: &[u8]) -> u64 {
    u64::from_le_bytes(
        wrapped[TIMESTAMP_SIZE..TIMESTAMP_SIZE + HASH_SIZE]
            .try_into()
            .unwrap(),
    )
}

fn key_len(wrapped: &[u8]) -> usize {
    u16::from_le_bytes(
        wrapped[TIMESTAMP_SIZE + HASH_SIZE..HEADERS_SIZE]
            .try_into()
            .unwrap(),
    ) as usize
}

/// Copies the key out of a record.
pub(crate) fn key(wrapped: &[u8]) -> String {
    let len = key_len(wrapped);
    String::from_utf8_lossy(&wrapped[HEADERS_SIZE..HEADERS_SIZE + len]).into_owned()
}

/// Copies the value out of a record.
pub(crate) fn value(wrapped: &[u8]) -> Vec<u8> {
    let len = key_len(wrapped);
    wrapped[HEADERS_SIZE + len..].to_vec()
}

/// Compares a record's key bytes against `key` without copying.
pub(crate) fn key_matches(wrapped: &[u8], key: &str) -> bool {
    let len = key_len(wrapped);
    &wrapped[HEADERS_SIZE..HEADERS_SIZE + len] == key.as_bytes()
}

/// Zeroes the hash field in place, turning the record into a tombstone
/// that eviction skips.
pub(crate) fn reset_hash(wrapped: &mut [u8]) {
    wrapped[TIMESTAMP_SIZE..TIMESTAMP_SIZE + HASH_SIZE].fill(0);
}
