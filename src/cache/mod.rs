//! Durable local cache for offline support.
//!
//! One serialized entry per collection name, plus the `sync-<collection>`
//! keys used for cross-context change signaling. Reads never fail outward:
//! corrupt or missing entries degrade to "no cached value".

mod store;

pub use store::{CacheStore, SqliteCache};
