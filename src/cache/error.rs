//! Storage error type for the disk cache.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Local disk failures raised by the cache store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A filesystem operation failed
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The incoming byte stream failed while being copied to disk
    #[error("failed to read incoming object stream: {0}")]
    Stream(#[source] io::Error),

    /// Metadata could not be (de)serialized
    #[error("invalid cache metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
