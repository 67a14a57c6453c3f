//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Storage (LocalStorage on web, files on native, memory for tests)
//! - Time (wall clock in milliseconds)

pub mod storage;
pub mod time;

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStore;
pub use storage::{KeyValueStore, MemoryStore, StorageError};
pub use time::now_ms;
