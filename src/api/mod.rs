//! API Module
//!
//! HTTP handlers and routing for the caching proxy.
//!
//! # Endpoints
//! - `GET /{bucket}/{path...}` - Serve an object, downloading it on a miss
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, create_router_with_timeout, DEFAULT_REQUEST_TIMEOUT};
