//! S3 Cache Proxy - a read-through caching proxy for S3 objects
//!
//! Serves objects from a disk-backed LRU cache and downloads misses from the
//! bucket's home region.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;

pub use api::AppState;
pub use config::Config;
pub use coordinator::RequestCoordinator;
