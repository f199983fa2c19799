//! Storage Module
//!
//! The single shared key-value mapping. Every connection holds an `Arc` to the
//! same store; there is no per-connection state.
//!
//! ## Example
//!
//! ```
//! use linekv::storage::{StorageEngine, Store};
//! use std::sync::Arc;
//!
//! let engine: Arc<dyn Store> = Arc::new(StorageEngine::new());
//! engine.set("name".to_string(), "Ariz".to_string());
//! assert_eq!(engine.get("name").as_deref(), Some("Ariz"));
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageStats, Store};
