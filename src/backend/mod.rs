//! Backend Module
//!
//! Resolves bucket regions and streams objects from the remote object store.

mod error;
mod fetcher;
mod key;
pub mod s3;

pub use error::BackendError;
pub use fetcher::{
    normalize_location, Fetcher, ObjectBody, ObjectReader, ObjectStore, RegionAwareFetcher,
    BOOTSTRAP_REGION,
};
pub use key::{parse_key, ObjectLocation};
pub use s3::S3ObjectStore;
