//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::BOOTSTRAP_REGION;
use crate::cache::BYTES_PER_GB;

const DEFAULT_PORT: u16 = 8900;
const DEFAULT_MAX_SIZE_GB: u64 = 50;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
const CACHE_DIR_NAME: &str = "s3-cache-proxy";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Cache root directory (metadata file and `files/`)
    pub cache_dir: PathBuf,
    /// Cache capacity in whole gigabytes
    pub max_size_gb: u64,
    /// Default AWS region for the SDK configuration
    pub aws_region: String,
    /// Upper bound for a single download, in seconds
    pub fetch_timeout_secs: u64,
    /// Upper bound for producing any HTTP response, in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` - HTTP server port (default: 8900)
    /// - `CACHE_DIR` - Cache directory (default: `<user cache dir>/s3-cache-proxy`)
    /// - `CACHE_MAX_SIZE_GB` - Cache capacity in GB (default: 50)
    /// - `AWS_REGION` - Default AWS region (default: us-east-1)
    /// - `FETCH_TIMEOUT_SECS` - Download timeout in seconds (default: 300)
    /// - `REQUEST_TIMEOUT_SECS` - HTTP request timeout in seconds (default: 600)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            max_size_gb: env::var("CACHE_MAX_SIZE_GB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_SIZE_GB),
            aws_region: env::var("AWS_REGION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| BOOTSTRAP_REGION.to_string()),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Cache capacity in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_gb.saturating_mul(BYTES_PER_GB)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            cache_dir: default_cache_dir(),
            max_size_gb: DEFAULT_MAX_SIZE_GB,
            aws_region: BOOTSTRAP_REGION.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// `<user cache dir>/s3-cache-proxy`, or under `/tmp` when there is none.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(CACHE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 8900);
        assert_eq!(config.max_size_gb, 50);
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.fetch_timeout_secs, 300);
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
        assert!(config.cache_dir.ends_with("s3-cache-proxy"));
    }

    #[test]
    fn test_max_size_bytes() {
        let config = Config {
            max_size_gb: 2,
            ..Config::default()
        };
        assert_eq!(config.max_size_bytes(), 2 * 1024 * 1024 * 1024);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_from_env() {
        // Env vars are process-wide, so defaults and overrides share one test
        env::remove_var("PORT");
        env::remove_var("CACHE_DIR");
        env::remove_var("CACHE_MAX_SIZE_GB");
        env::remove_var("AWS_REGION");
        env::remove_var("FETCH_TIMEOUT_SECS");
        env::remove_var("REQUEST_TIMEOUT_SECS");

        let config = Config::from_env();
        assert_eq!(config.server_port, 8900);
        assert_eq!(config.max_size_gb, 50);
        assert_eq!(config.aws_region, "us-east-1");

        env::set_var("PORT", "9100");
        env::set_var("CACHE_DIR", "/srv/cache");
        env::set_var("CACHE_MAX_SIZE_GB", "not-a-number");
        env::set_var("FETCH_TIMEOUT_SECS", "30");
        env::set_var("REQUEST_TIMEOUT_SECS", "45");

        let config = Config::from_env();
        assert_eq!(config.server_port, 9100);
        assert_eq!(config.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.max_size_gb, 50);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.request_timeout_secs, 45);

        env::remove_var("PORT");
        env::remove_var("CACHE_DIR");
        env::remove_var("CACHE_MAX_SIZE_GB");
        env::remove_var("FETCH_TIMEOUT_SECS");
        env::remove_var("REQUEST_TIMEOUT_SECS");
    }
}
