//! Common utility functions shared across CLI commands.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdcsync_core::{
    FingerprintCache, FingerprintHasher, FingerprintStore, HttpConfig, HttpFetcher, ImageSource,
    SyncConfig,
};
use tracing::debug;

/// Read a text argument: `-` means stdin, an existing path is read as a
/// file, anything else is taken literally.
pub fn read_text_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    let path = Path::new(arg);
    if path.is_file() {
        debug!(path = %path.display(), "Reading argument from file");
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()));
    }
    Ok(arg.to_string())
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Image source that reads local paths from disk and fetches everything
/// else over HTTP.
pub struct FileOrHttpSource {
    http: Arc<HttpFetcher>,
}

impl FileOrHttpSource {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageSource for FileOrHttpSource {
    async fn fetch_image(&self, location: &str) -> sdcsync_core::Result<Vec<u8>> {
        if is_remote(location) {
            return self.http.fetch_image(location).await;
        }
        Ok(tokio::fs::read(location).await?)
    }
}

pub fn http_fetcher(config: &SyncConfig) -> Result<Arc<HttpFetcher>> {
    let fetcher = HttpFetcher::new(HttpConfig::from(config)).context("Failed to create HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Open the fingerprint cache at `db`, or at the configured location.
pub fn open_cache<S: ImageSource>(
    config: &SyncConfig,
    db: Option<&Path>,
    source: S,
) -> Result<FingerprintCache<S>> {
    let path: PathBuf = db.map_or_else(|| config.fingerprint_db.clone(), Path::to_path_buf);
    let store = FingerprintStore::open(&path)
        .with_context(|| format!("Failed to open fingerprint cache: {}", path.display()))?;
    Ok(FingerprintCache::new(store, source, FingerprintHasher::new(config.hash_size))
        .with_min_image_bytes(config.min_image_bytes))
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
