//! Cache Entry Module
//!
//! Defines the metadata record kept for every object stored on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Metadata for one cached object.
///
/// The serialized form is what `metadata.json` stores, one object per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key, `<bucket>/<object path>`
    pub key: String,
    /// File name inside the `files/` directory
    #[serde(rename = "filename")]
    pub local_name: String,
    /// Stored content length in bytes
    pub size: u64,
    /// Last time the entry was served
    #[serde(rename = "accessTime")]
    pub last_access: DateTime<Utc>,
    /// When the object was first written to disk
    #[serde(rename = "createTime")]
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry for a freshly stored object, stamped with the current time.
    pub fn new(key: impl Into<String>, local_name: impl Into<String>, size: u64) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            local_name: local_name.into(),
            size,
            last_access: now,
            created_at: now,
        }
    }

    // == Touch ==
    /// Marks the entry as accessed now.
    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }
}
