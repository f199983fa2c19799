//! Thread-Safe Storage Engine
//!
//! This module implements the shared key-value store behind every connection.
//! All clients read and write the same mapping: a `SET` issued on one connection
//! is visible to a `GET` on any other.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function. Writers to the same
//! key serialize on that key's shard lock, so a reader always sees a complete value.
//! Keys that land in different shards never contend.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// The key-value contract the command dispatcher depends on.
///
/// Implementations must be safe to share between connection tasks and must make
/// each `set` atomic with respect to concurrent `get`s of the same key.
pub trait Store: Send + Sync {
    /// Creates or overwrites the mapping for `key`.
    fn set(&self, key: String, value: String);

    /// Returns the current value for `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Option<String>;
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<String, String>>,
}

/// Point-in-time counters describing store activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of distinct keys
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// GET operations that found a value
    pub get_hits: u64,
    /// Total SET operations
    pub set_ops: u64,
}

/// The default [`Store`] implementation: an in-memory, sharded hash map.
///
/// Wrap it in an `Arc` and hand a clone to every connection.
///
/// # Example
///
/// ```
/// use linekv::storage::{StorageEngine, Store};
///
/// let engine = StorageEngine::new();
/// engine.set("name".to_string(), "Ariz".to_string());
///
/// assert_eq!(engine.get("name"), Some("Ariz".to_string()));
/// assert_eq!(engine.get("missing"), None);
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    hit_count: AtomicU64,
    set_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            get_hits: self.hit_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
        }
    }
}

impl Store for StorageEngine {
    fn set(&self, key: String, value: String) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(&key);
        // Writes are a single insert, so a poisoned shard is still consistent.
        let mut data = shard.data.write().unwrap_or_else(PoisonError::into_inner);

        if data.insert(key, value).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let data = shard.data.read().unwrap_or_else(PoisonError::into_inner);

        let value = data.get(key).cloned();
        if value.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();
        engine.set("key".to_string(), "value".to_string());
        assert_eq!(engine.get("key"), Some("value".to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get("nonexistent"), None);
    }

    #[test]
    fn test_overwrite() {
        let engine = StorageEngine::new();
        engine.set("key".to_string(), "first".to_string());
        engine.set("key".to_string(), "second".to_string());

        assert_eq!(engine.get("key"), Some("second".to_string()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_empty_value_is_found() {
        let engine = StorageEngine::new();
        engine.set("key".to_string(), String::new());
        assert_eq!(engine.get("key"), Some(String::new()));
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();
        assert!(engine.is_empty());

        engine.set("a".to_string(), "1".to_string());
        engine.set("b".to_string(), "2".to_string());
        engine.set("a".to_string(), "3".to_string());
        engine.get("a");
        engine.get("missing");

        assert_eq!(
            engine.stats(),
            StorageStats {
                keys: 2,
                get_ops: 2,
                get_hits: 1,
                set_ops: 3,
            }
        );
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key:{}:{}", i, j);
                    engine.set(key.clone(), format!("value:{}", j));
                    assert_eq!(engine.get(&key), Some(format!("value:{}", j)));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let engine = Arc::new(StorageEngine::new());
        let values: Vec<String> = (0..8)
            .map(|i| format!("writer-{}-{}", i, "x".repeat(256)))
            .collect();

        let handles: Vec<_> = values
            .iter()
            .cloned()
            .map(|value| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..200 {
                        engine.set("shared".to_string(), value.clone());
                        let seen = engine.get("shared").unwrap();
                        assert!(seen.starts_with("writer-") && seen.ends_with(&"x".repeat(256)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let last = engine.get("shared").unwrap();
        assert!(values.contains(&last));
    }
}
