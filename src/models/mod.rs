//! Response models for the proxy API
//!
//! DTOs serialized into JSON response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
