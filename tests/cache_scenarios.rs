// ==============================================
// CACHE END-TO-END SCENARIOS (integration)
// ==============================================
//
// Exercises the public cache surface with a deterministic clock: TTL and
// sweeper behavior, capacity-pressure eviction, forced hash collisions and
// the remove-callback variants.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytecache::cache::Cache;
use bytecache::config::{Config, RemoveReason};
use bytecache::error::CacheError;

use common::{wait_until, ConstHasher, MockClock};

fn cache_with_clock(config: Config) -> (Cache, Arc<MockClock>) {
    let clock = Arc::new(MockClock::new(10_000));
    let cache = Cache::with_clock(config, clock.clone()).expect("valid config");
    (cache, clock)
}

/// Small sizing hints; the defaults preallocate for hundreds of thousands
/// of entries.
fn base_config(shards: usize) -> Config {
    Config::default()
        .shards(shards)
        .max_entries_in_window(1024)
        .max_entry_size(256)
}

// ==============================================
// Basic round trips
// ==============================================

#[test]
fn two_shard_round_trip() {
    let (cache, _) = cache_with_clock(base_config(2));

    cache.set("a", &[0x01]).unwrap();
    cache.set("b", &[0x02, 0x03]).unwrap();

    assert_eq!(cache.get("a").unwrap(), vec![0x01]);
    assert_eq!(cache.get("b").unwrap(), vec![0x02, 0x03]);
    assert_eq!(cache.len(), 2);
}

#[test]
fn returned_value_is_a_distinct_buffer() {
    let (cache, _) = cache_with_clock(base_config(2));
    cache.set("k", b"immutable").unwrap();

    let mut copy = cache.get("k").unwrap();
    copy[0] = b'X';
    assert_eq!(cache.get("k").unwrap(), b"immutable");
}

#[test]
fn append_concatenates_across_calls() {
    let (cache, _) = cache_with_clock(base_config(2));
    cache.append("journal", b"alpha").unwrap();
    cache.append("journal", b"-beta").unwrap();
    assert_eq!(cache.get("journal").unwrap(), b"alpha-beta");
    assert_eq!(cache.len(), 1);
}

// ==============================================
// TTL visibility without a sweeper
// ==============================================

#[test]
fn expired_entry_stays_readable_until_evicted() {
    let (cache, clock) = cache_with_clock(
        base_config(2)
            .life_window(Duration::from_secs(1)),
    );

    cache.set("k", b"v").unwrap();
    clock.advance(2);

    let (value, info) = cache.get_with_info("k").unwrap();
    assert_eq!(value, b"v");
    assert!(info.expired);
    // Plain get does not observe expiry at all.
    assert_eq!(cache.get("k").unwrap(), b"v");
    assert_eq!(cache.len(), 1);
}

#[test]
fn zero_life_window_disables_expiry() {
    let (cache, clock) = cache_with_clock(base_config(2));
    cache.set("k", b"v").unwrap();
    clock.advance(1_000_000);

    let (_, info) = cache.get_with_info("k").unwrap();
    assert!(!info.expired);
    assert_eq!(cache.len(), 1);
}

// ==============================================
// Background sweeper
// ==============================================

#[test]
fn sweeper_expires_all_entries_and_reports_reason() {
    let expired = Arc::new(Mutex::new(Vec::new()));
    let sink = expired.clone();

    let (cache, clock) = cache_with_clock(
        base_config(4)
            .life_window(Duration::from_secs(1))
            .clean_window(Duration::from_millis(50))
            .on_remove_with_reason(Box::new(move |key, _, reason| {
                sink.lock().unwrap().push((key.to_string(), reason));
            })),
    );

    for i in 0..100 {
        cache.set(&format!("key-{i}"), &[i as u8]).unwrap();
    }
    assert_eq!(cache.len(), 100);

    clock.advance(2);
    assert!(
        wait_until(Duration::from_secs(5), || cache.len() == 0),
        "sweeper did not drain the cache in time"
    );

    let events = expired.lock().unwrap();
    assert_eq!(events.len(), 100);
    assert!(events.iter().all(|(_, reason)| *reason == RemoveReason::Expired));
}

#[test]
fn close_stops_the_sweeper() {
    let (cache, clock) = cache_with_clock(
        base_config(2)
            .life_window(Duration::from_secs(1))
            .clean_window(Duration::from_millis(20)),
    );
    cache.set("k", b"v").unwrap();
    cache.close();

    // With the sweeper gone, expiry is no longer collected in the
    // background; the entry lingers.
    clock.advance(10);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(cache.len(), 1);
}

// ==============================================
// Capacity pressure
// ==============================================

#[test]
fn hard_cap_evicts_oldest_with_no_space_reason() {
    let no_space = Arc::new(AtomicUsize::new(0));
    let counter = no_space.clone();

    let (cache, _) = cache_with_clock(
        Config::default()
            .shards(1)
            .max_entry_size(1024)
            .hard_max_cache_size_mb(1)
            .on_remove_with_reason(Box::new(move |_, _, reason| {
                if reason == RemoveReason::NoSpace {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })),
    );

    for i in 0..4096 {
        cache.set(&format!("key-{i}"), &[0xAB; 1024]).unwrap();
    }

    // ~1 KiB per record against a 1 MiB shard: fewer than 1024 survive.
    assert!(cache.len() < 1024, "len {} should be under 1024", cache.len());
    assert!(no_space.load(Ordering::SeqCst) > 0);
    assert_eq!(cache.get("key-0"), Err(CacheError::EntryNotFound));
    assert_eq!(cache.get("key-4095").unwrap(), vec![0xAB; 1024]);
}

// ==============================================
// Forced collisions
// ==============================================

#[test]
fn same_hash_keys_last_writer_wins() {
    let (cache, _) = cache_with_clock(
        base_config(2)
            .hasher(Arc::new(ConstHasher(0x42))),
    );

    cache.set("k1", b"A").unwrap();
    cache.set("k2", b"B").unwrap();

    // The overwrite tombstoned k1's record; k1 now collides with k2.
    assert_eq!(cache.get("k1"), Err(CacheError::EntryNotFound));
    assert_eq!(cache.get("k2").unwrap(), b"B");
    assert!(cache.stats().collisions >= 1);
}

// ==============================================
// Delete semantics
// ==============================================

#[test]
fn delete_hits_then_misses() {
    let (cache, _) = cache_with_clock(base_config(2));
    cache.set("x", b"1").unwrap();

    assert!(cache.delete("x").is_ok());
    assert_eq!(cache.stats().del_hits, 1);

    assert_eq!(cache.delete("x"), Err(CacheError::EntryNotFound));
    assert_eq!(cache.stats().del_misses, 1);
}

// ==============================================
// Remove-callback shapes
// ==============================================

#[test]
fn reason_filter_suppresses_unselected_reasons() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let (cache, clock) = cache_with_clock(
        base_config(2)
            .life_window(Duration::from_secs(1))
            .clean_window(Duration::from_millis(30))
            .on_remove_with_reason(Box::new(move |key, _, reason| {
                sink.lock().unwrap().push((key.to_string(), reason));
            }))
            .on_remove_filter(&[RemoveReason::Expired]),
    );

    cache.set("deleted", b"1").unwrap();
    cache.delete("deleted").unwrap();

    cache.set("expires", b"2").unwrap();
    clock.advance(3);
    assert!(wait_until(Duration::from_secs(5), || cache.len() == 0));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], ("expires".to_string(), RemoveReason::Expired));
}

#[test]
fn plain_callback_receives_key_and_value() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let (cache, _) = cache_with_clock(
        base_config(2)
            .on_remove(Box::new(move |key, value| {
                sink.lock().unwrap().push((key.to_string(), value.to_vec()));
            })),
    );

    cache.set("gone", b"payload").unwrap();
    cache.delete("gone").unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.as_slice(), &[("gone".to_string(), b"payload".to_vec())]);
}

#[test]
fn metadata_callback_sees_request_count() {
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = counts.clone();

    let (cache, _) = cache_with_clock(
        base_config(2)
            .stats_enabled(true)
            .on_remove_with_metadata(Box::new(move |key, _, metadata| {
                sink.lock().unwrap().push((key.to_string(), metadata.request_count));
            })),
    );

    cache.set("popular", b"v").unwrap();
    cache.get("popular").unwrap();
    cache.get("popular").unwrap();
    cache.get("popular").unwrap();
    cache.delete("popular").unwrap();

    let counts = counts.lock().unwrap();
    assert_eq!(counts.as_slice(), &[("popular".to_string(), 3)]);
}

// ==============================================
// Stats surface
// ==============================================

#[test]
fn stats_track_hits_misses_and_metadata() {
    let (cache, _) = cache_with_clock(base_config(2).stats_enabled(true));

    cache.set("k", b"v").unwrap();
    cache.get("k").unwrap();
    cache.get("k").unwrap();
    let _ = cache.get("absent");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(cache.key_metadata("k").request_count, 2);
    assert_eq!(cache.key_metadata("absent").request_count, 0);
}

// ==============================================
// Iteration
// ==============================================

#[test]
fn iterator_returns_keys_values_and_timestamps() {
    let (cache, clock) = cache_with_clock(base_config(4));
    let written_at = clock.now();
    for i in 0..10 {
        cache.set(&format!("key-{i}"), format!("value-{i}").as_bytes()).unwrap();
    }

    let mut entries: Vec<_> = cache.iter().collect();
    entries.sort_by(|a, b| a.key().cmp(b.key()));

    assert_eq!(entries.len(), 10);
    for entry in &entries {
        let index: usize = entry.key().trim_start_matches("key-").parse().unwrap();
        assert_eq!(entry.value(), format!("value-{index}").as_bytes());
        assert_eq!(entry.timestamp(), written_at);
    }
}
