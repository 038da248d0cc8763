//! Response DTOs for the proxy API
//!
//! Defines the structure of outgoing JSON response bodies.

use std::path::PathBuf;

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Bytes currently cached
    pub total_bytes: u64,
    /// Configured capacity in bytes
    pub max_bytes: u64,
    /// Current number of entries in cache
    pub entry_count: usize,
    /// Cache root directory
    pub cache_dir: PathBuf,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_bytes: stats.total_bytes,
            max_bytes: stats.max_bytes,
            entry_count: stats.entry_count,
            cache_dir: stats.cache_dir,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_from_stats() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            total_bytes: 1_000,
            max_bytes: 2_000,
            entry_count: 4,
            cache_dir: PathBuf::from("/cache"),
        };
        let resp = StatsResponse::from(stats);

        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.entry_count, 4);
    }

    #[test]
    fn test_stats_response_field_names() {
        let resp = StatsResponse::from(CacheStats::default());
        let json = serde_json::to_value(&resp).unwrap();

        for field in [
            "hits",
            "misses",
            "evictions",
            "totalBytes",
            "maxBytes",
            "entryCount",
            "cacheDir",
            "hitRate",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["hitRate"], 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
