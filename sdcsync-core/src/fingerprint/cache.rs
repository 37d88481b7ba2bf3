//! Durable fingerprint cache.
//!
//! Fingerprints are keyed by the exact image URL. Entries are never evicted;
//! a stale entry is overwritten when the owning resource has changed since
//! the fingerprint was taken.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{FingerprintHasher, HashValue, ImageSource, PerceptualFingerprint};
use crate::error::{Result, SyncError, MIN_IMAGE_BYTES};

/// SQLite table of fingerprints.
pub struct FingerprintStore {
    conn: Connection,
}

impl FingerprintStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        debug!(path = %path.display(), "Opened fingerprint cache");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS imagecache (
                url TEXT PRIMARY KEY,
                phashlen INTEGER NOT NULL,
                phashval TEXT NOT NULL,
                dhashlen INTEGER NOT NULL,
                dhashval TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn get(&self, url: &str) -> Result<Option<PerceptualFingerprint>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, phashlen, phashval, dhashlen, dhashval, timestamp
                 FROM imagecache WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((stored_url, plen, pval, dlen, dval, timestamp)) = row else {
            return Ok(None);
        };
        if stored_url != url {
            return Err(SyncError::CacheUrlMismatch {
                requested: url.to_string(),
                stored: stored_url,
            });
        }

        Ok(Some(PerceptualFingerprint {
            url: stored_url,
            phash: HashValue::from_hex(plen, &pval)?,
            dhash: HashValue::from_hex(dlen, &dval)?,
            timestamp: parse_timestamp(&timestamp)?,
        }))
    }

    /// Insert or overwrite the entry for the fingerprint's URL.
    pub fn upsert(&self, fingerprint: &PerceptualFingerprint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO imagecache (url, phashlen, phashval, dhashlen, dhashval, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(url) DO UPDATE SET
                phashlen = excluded.phashlen,
                phashval = excluded.phashval,
                dhashlen = excluded.dhashlen,
                dhashval = excluded.dhashval,
                timestamp = excluded.timestamp",
            params![
                fingerprint.url,
                fingerprint.phash.width,
                fingerprint.phash.to_hex(),
                fingerprint.dhash.width,
                fingerprint.dhash.to_hex(),
                fingerprint.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM imagecache", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Stored timestamps are RFC 3339. Older entries may lack an offset; those
/// were always written in UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| SyncError::SerializationError(format!("Invalid cache timestamp {value:?}: {e}")))
}

/// Fingerprint cache in front of an image source.
///
/// The read-then-maybe-write sequence of [`get_or_refresh`](Self::get_or_refresh)
/// runs under one lock, so concurrent callers never download the same URL
/// twice or interleave their writes.
pub struct FingerprintCache<S> {
    store: Mutex<FingerprintStore>,
    source: S,
    hasher: FingerprintHasher,
    min_image_bytes: usize,
}

impl<S: ImageSource> FingerprintCache<S> {
    pub fn new(store: FingerprintStore, source: S, hasher: FingerprintHasher) -> Self {
        Self {
            store: Mutex::new(store),
            source,
            hasher,
            min_image_bytes: MIN_IMAGE_BYTES,
        }
    }

    pub fn with_min_image_bytes(mut self, min_image_bytes: usize) -> Self {
        self.min_image_bytes = min_image_bytes;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cached fingerprint for `url`, without downloading.
    pub async fn cached(&self, url: &str) -> Result<Option<PerceptualFingerprint>> {
        self.store.lock().await.get(url)
    }

    /// Return the cached fingerprint for `url`, computing it on a miss and
    /// recomputing it when `last_modified` is newer than the cached one.
    ///
    /// A fresh fingerprint is stamped with `last_modified`, or the current
    /// time when unknown. Failed downloads are never cached.
    #[instrument(skip(self))]
    pub async fn get_or_refresh(
        &self,
        url: &str,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<PerceptualFingerprint> {
        let store = self.store.lock().await;

        if let Some(cached) = store.get(url)? {
            let stale = last_modified.is_some_and(|modified| cached.timestamp < modified);
            if !stale {
                debug!(url, "Fingerprint cache hit");
                return Ok(cached);
            }
            info!(
                url,
                cached = %cached.timestamp,
                modified = ?last_modified,
                "Cached fingerprint is stale, refreshing"
            );
        }

        let bytes = self.source.fetch_image(url).await?;
        if bytes.len() < self.min_image_bytes {
            warn!(url, bytes = bytes.len(), "Download too small to be an image");
            return Err(SyncError::NetworkFailure(format!(
                "{url} returned only {} bytes",
                bytes.len()
            )));
        }

        let timestamp = last_modified.unwrap_or_else(Utc::now);
        let fingerprint = self.hasher.fingerprint(url, &bytes, timestamp)?;
        store.upsert(&fingerprint)?;
        debug!(
            url,
            phash = %fingerprint.phash.to_hex(),
            dhash = %fingerprint.dhash.to_hex(),
            "Stored fingerprint"
        );
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            Rgb([((x * 4) % 256) as u8, ((y * 4) % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    struct CountingSource {
        body: Vec<u8>,
        downloads: AtomicUsize,
    }

    impl CountingSource {
        fn new(body: Vec<u8>) -> Self {
            Self {
                body,
                downloads: AtomicUsize::new(0),
            }
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageSource for CountingSource {
        async fn fetch_image(&self, _url: &str) -> Result<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.body.is_empty() {
                return Err(SyncError::NetworkFailure("unreachable".to_string()));
            }
            Ok(self.body.clone())
        }
    }

    fn cache_with(body: Vec<u8>) -> FingerprintCache<CountingSource> {
        FingerprintCache::new(
            FingerprintStore::open_in_memory().unwrap(),
            CountingSource::new(body),
            FingerprintHasher::default(),
        )
    }

    const URL: &str = "https://finna.fi/Cover/Show?id=museovirasto.ABC&index=0&size=large";

    #[tokio::test]
    async fn test_unchanged_timestamp_downloads_once() {
        let cache = cache_with(png_bytes());
        let modified = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = cache.get_or_refresh(URL, Some(modified)).await.unwrap();
        let second = cache.get_or_refresh(URL, Some(modified)).await.unwrap();

        assert_eq!(cache.source().downloads(), 1);
        assert_eq!(first, second);
        assert_eq!(first.timestamp, modified);
    }

    #[tokio::test]
    async fn test_unknown_modification_time_uses_cache() {
        let cache = cache_with(png_bytes());
        cache.get_or_refresh(URL, None).await.unwrap();
        cache.get_or_refresh(URL, None).await.unwrap();
        assert_eq!(cache.source().downloads(), 1);
    }

    #[tokio::test]
    async fn test_newer_modification_refreshes() {
        let cache = cache_with(png_bytes());
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        cache.get_or_refresh(URL, Some(old)).await.unwrap();
        let refreshed = cache.get_or_refresh(URL, Some(new)).await.unwrap();

        assert_eq!(cache.source().downloads(), 2);
        assert_eq!(refreshed.timestamp, new);
        assert_eq!(cache.cached(URL).await.unwrap().unwrap().timestamp, new);

        // Older modification time than the cache: no refresh
        cache.get_or_refresh(URL, Some(old)).await.unwrap();
        assert_eq!(cache.source().downloads(), 2);
    }

    #[tokio::test]
    async fn test_same_instant_in_other_zone_is_not_older() {
        let cache = cache_with(png_bytes());
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let helsinki = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 15, 0, 0)
            .unwrap();

        cache.get_or_refresh(URL, Some(utc)).await.unwrap();
        cache
            .get_or_refresh(URL, Some(helsinki.with_timezone(&Utc)))
            .await
            .unwrap();
        assert_eq!(cache.source().downloads(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_is_not_cached() {
        let cache = cache_with(Vec::new());
        let result = cache.get_or_refresh(URL, None).await;
        assert!(matches!(result, Err(SyncError::NetworkFailure(_))));
        assert!(cache.cached(URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tiny_payload_rejected() {
        let cache = cache_with(vec![0xFF; 10]);
        let result = cache.get_or_refresh(URL, None).await;
        assert!(matches!(result, Err(SyncError::NetworkFailure(_))));
        assert!(cache.cached(URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_payload_rejected() {
        let cache = cache_with(vec![0x42; 500]);
        let result = cache.get_or_refresh(URL, None).await;
        assert!(matches!(result, Err(SyncError::PerceptualHashError(_))));
        assert!(cache.cached(URL).await.unwrap().is_none());
    }

    #[test]
    fn test_store_keys_on_exact_url() {
        let store = FingerprintStore::open_in_memory().unwrap();
        let fp = PerceptualFingerprint {
            url: URL.to_string(),
            phash: HashValue::new(8, vec![0x11; 8]),
            dhash: HashValue::new(8, vec![0x22; 8]),
            timestamp: Utc.with_ymd_and_hms(2023, 3, 3, 3, 3, 3).unwrap(),
        };
        store.upsert(&fp).unwrap();
        store.upsert(&fp).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(URL).unwrap(), Some(fp));
        // A truncated URL is a different key
        assert_eq!(store.get(&URL[..URL.len() - 1]).unwrap(), None);
    }

    #[test]
    fn test_store_persists_to_disk() {
        let dir = std::env::temp_dir().join(format!("sdcsync-fp-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("imagedatacache.db");
        let _ = std::fs::remove_file(&path);

        let fp = PerceptualFingerprint {
            url: "https://example.org/x.jpg".to_string(),
            phash: HashValue::new(8, vec![0x0f; 8]),
            dhash: HashValue::new(8, vec![0xf0; 8]),
            timestamp: Utc.with_ymd_and_hms(2022, 2, 2, 2, 2, 2).unwrap(),
        };
        FingerprintStore::open(&path).unwrap().upsert(&fp).unwrap();
        let reopened = FingerprintStore::open(&path).unwrap();
        assert_eq!(reopened.get(&fp.url).unwrap(), Some(fp));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_parse_legacy_naive_timestamp() {
        let parsed = parse_timestamp("2023-08-01T10:20:30.123456").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2023, 8, 1, 10, 20, 30).unwrap()
                + chrono::Duration::microseconds(123456)
        );
        assert_eq!(
            parse_timestamp("2023-08-01T10:20:30+03:00").unwrap(),
            Utc.with_ymd_and_hms(2023, 8, 1, 7, 20, 30).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
