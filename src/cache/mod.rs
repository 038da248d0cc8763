//! Cache Module
//!
//! Disk-backed LRU cache with crash-safe metadata persistence.

mod entry;
mod error;
mod lru;
pub mod metadata;
pub mod naming;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use error::StorageError;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{DiskCache, StagedObject, FILES_DIR};

// == Public Constants ==
/// Bytes per gigabyte, the unit capacity is configured in
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;
