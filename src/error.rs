//! Error types for the proxy
//!
//! Request-level errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;
use crate::cache::StorageError;
use crate::models::ErrorResponse;

// == Proxy Error Enum ==
/// Failure of a single proxied request.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Object absent from the cache and the backend
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Key without a `<bucket>/<path>` shape
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Region resolution or download failure
    #[error("Download failed: {0}")]
    Backend(BackendError),

    /// Local disk failure while storing the object
    #[error("Cache storage failed: {0}")]
    Storage(StorageError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) | ProxyError::InvalidKey(_) | ProxyError::Backend(_) => {
                StatusCode::NOT_FOUND
            }
            ProxyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for ProxyError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidKey(key) => ProxyError::InvalidKey(key),
            BackendError::NotFound(what) => ProxyError::NotFound(what),
            other => ProxyError::Backend(other),
        }
    }
}

impl From<StorageError> for ProxyError {
    fn from(err: StorageError) -> Self {
        match err {
            // the backend stream broke mid-transfer, not the local disk
            StorageError::Stream(e) => ProxyError::Backend(BackendError::Transient(e.to_string())),
            other => ProxyError::Storage(other),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;
