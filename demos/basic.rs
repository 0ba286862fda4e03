use std::time::Duration;

use bytecache::prelude::{Cache, Config};

fn main() {
    // Cache with a ten-minute TTL, swept once per second.
    let config = Config::eviction(Duration::from_secs(600))
        .shards(64)
        .max_entries_in_window(10_000)
        .max_entry_size(256);
    let cache = Cache::new(config).expect("valid config");

    cache.set("key1", b"value1").expect("set failed");

    if let Ok(value) = cache.get("key1") {
        println!("Got from cache: {}", String::from_utf8_lossy(&value));
    }

    // Append concatenates under one key.
    cache.append("log", b"first").expect("append failed");
    cache.append("log", b" second").expect("append failed");
    println!(
        "Appended entry: {}",
        String::from_utf8_lossy(&cache.get("log").expect("get failed"))
    );

    println!("Entries: {}, allocated bytes: {}", cache.len(), cache.capacity());
}
