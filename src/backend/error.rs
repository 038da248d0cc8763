//! Backend Error Types
//!
//! Distinct failure kinds for region resolution and object downloads.

use thiserror::Error;

/// Object store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("invalid key, expected <bucket>/<path>: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("failed to resolve region for bucket {bucket}: {reason}")]
    RegionResolution { bucket: String, reason: String },

    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("backend error: {0}")]
    Service(String),

    #[error("download timed out after {0}s")]
    Timeout(u64),
}

impl BackendError {
    /// Whether a later identical request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_) | BackendError::Timeout(_))
    }
}
