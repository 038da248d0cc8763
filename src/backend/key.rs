//! Object key parsing.

use crate::backend::BackendError;

/// A cache key split into its bucket and object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub object_key: String,
}

/// Splits `<bucket>/<path>` at the first `/`.
///
/// A key without a separator, or with an empty bucket or path, is rejected
/// before any network call.
pub fn parse_key(key: &str) -> Result<ObjectLocation, BackendError> {
    match key.split_once('/') {
        Some((bucket, object_key)) if !bucket.is_empty() && !object_key.is_empty() => {
            Ok(ObjectLocation {
                bucket: bucket.to_string(),
                object_key: object_key.to_string(),
            })
        }
        _ => Err(BackendError::InvalidKey(key.to_string())),
    }
}
