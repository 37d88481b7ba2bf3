//! Runtime configuration
//!
//! Loaded from environment variables with defaults for the public catalog.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MIN_IMAGE_BYTES;

/// User agent sent with every request. Some image hosts reject default
/// client agents.
pub const DEFAULT_USER_AGENT: &str =
    concat!("sdcsync/", env!("CARGO_PKG_VERSION"), " (structured data sync)");

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Record API base (default: https://api.finna.fi/v1)
    pub api_url: String,
    /// Prefix for catalog-relative image paths (default: https://finna.fi)
    pub image_base: String,
    /// Public record page prefix (default: https://www.finna.fi/Record/)
    pub record_base: String,
    /// Fingerprint cache database (default: imagedatacache.db)
    pub fingerprint_db: PathBuf,
    /// Accession number crosswalk database (default: fngcache.db)
    pub crosswalk_db: PathBuf,
    pub user_agent: String,
    /// Per-request timeout in seconds (default: 30)
    pub http_timeout_secs: u64,
    /// Retries for transient network failures (default: 3)
    pub http_max_retries: u32,
    /// Perceptual hash width in bits per side (default: 8)
    pub hash_size: u32,
    /// Smallest download accepted as an image (default: 50)
    pub min_image_bytes: usize,
    /// Lookup tables JSON; the bundled tables are used when unset
    pub lookup_tables: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.finna.fi/v1".to_string(),
            image_base: "https://finna.fi".to_string(),
            record_base: "https://www.finna.fi/Record/".to_string(),
            fingerprint_db: PathBuf::from("imagedatacache.db"),
            crosswalk_db: PathBuf::from("fngcache.db"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: 30,
            http_max_retries: 3,
            hash_size: 8,
            min_image_bytes: MIN_IMAGE_BYTES,
            lookup_tables: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("FINNA_API_URL").unwrap_or(defaults.api_url);
        let image_base = std::env::var("FINNA_IMAGE_BASE").unwrap_or(defaults.image_base);
        let record_base = std::env::var("FINNA_RECORD_BASE").unwrap_or(defaults.record_base);

        let fingerprint_db = std::env::var("FINGERPRINT_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.fingerprint_db);

        let crosswalk_db = std::env::var("CROSSWALK_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.crosswalk_db);

        let user_agent = std::env::var("HTTP_USER_AGENT")
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.http_timeout_secs);

        let http_max_retries = std::env::var("HTTP_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.http_max_retries);

        // Widths the hash library cannot produce fall back to the default
        let hash_size = std::env::var("HASH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|size| (4..=32).contains(size))
            .unwrap_or(defaults.hash_size);

        let min_image_bytes = std::env::var("MIN_IMAGE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_image_bytes);

        let lookup_tables = std::env::var("LOOKUP_TABLES").ok().map(PathBuf::from);

        Self {
            api_url,
            image_base,
            record_base,
            fingerprint_db,
            crosswalk_db,
            user_agent,
            http_timeout_secs,
            http_max_retries,
            hash_size,
            min_image_bytes,
            lookup_tables,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_public_catalog() {
        let config = SyncConfig::default();
        assert_eq!(config.api_url, "https://api.finna.fi/v1");
        assert_eq!(config.record_base, "https://www.finna.fi/Record/");
        assert_eq!(config.hash_size, 8);
        assert_eq!(config.min_image_bytes, 50);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert!(config.lookup_tables.is_none());
        assert!(config.user_agent.starts_with("sdcsync/"));
    }
}
