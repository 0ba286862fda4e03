use std::time::Duration;

use bytecache::prelude::{Cache, Config, RemoveReason};

fn main() {
    // A tiny hard cap forces NoSpace evictions; the callback reports every
    // removal with its reason.
    let config = Config::default()
        .shards(1)
        .hard_max_cache_size_mb(1)
        .max_entry_size(4096)
        .life_window(Duration::from_secs(30))
        .on_remove_with_reason(Box::new(|key, value, reason| {
            let reason = match reason {
                RemoveReason::Expired => "expired",
                RemoveReason::NoSpace => "no space",
                RemoveReason::Deleted => "deleted",
            };
            println!("evicted {key} ({} bytes): {reason}", value.len());
        }));

    let cache = Cache::new(config).expect("valid config");

    for i in 0..512 {
        cache
            .set(&format!("blob-{i}"), &vec![0u8; 4096])
            .expect("set failed");
    }

    cache.delete("blob-511").expect("delete failed");

    println!("surviving entries: {}", cache.len());
}
