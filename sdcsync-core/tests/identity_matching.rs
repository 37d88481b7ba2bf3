//! Image identity tests with generated photographs.
//!
//! These exercise the full path from encoded image bytes through the
//! fingerprint cache to the match decision.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb};
use sdcsync_core::matcher::{compare, find_matching_candidate, CandidateMatch};
use sdcsync_core::{
    same_image, FingerprintCache, FingerprintHasher, FingerprintStore, ImageSource, SyncError,
};

/// Block pattern with strong low-frequency structure.
fn pattern(size: u32, inverted: bool) -> DynamicImage {
    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let scale = size / 8;
        let v = (((x / scale) * 37 + (y / scale) * 91) % 256) as u8;
        let v = if inverted { 255 - v } else { v };
        Rgb([v, v, v])
    });
    DynamicImage::ImageRgb8(img)
}

fn uniform(size: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(size, size, Rgb([128, 128, 128])))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encoding failed");
    out.into_inner()
}

fn compress_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    img.write_with_encoder(encoder)
        .expect("JPEG encoding failed");
    out.into_inner()
}

/// In-memory image host. Unknown URLs fail like an unreachable server.
#[derive(Default)]
struct FakeHost {
    images: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl FakeHost {
    fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for FakeHost {
    async fn fetch_image(&self, url: &str) -> sdcsync_core::Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::NetworkFailure(format!("404 for {url}")))
    }
}

fn cache(host: FakeHost) -> FingerprintCache<FakeHost> {
    FingerprintCache::new(
        FingerprintStore::open_in_memory().unwrap(),
        host,
        FingerprintHasher::default(),
    )
}

const LOCAL: &str = "https://upload.example/File_Kauppatori.jpg";

// ============================================================================
// Match Decisions
// ============================================================================

#[tokio::test]
async fn test_identical_image_matches() {
    let png = encode(&pattern(256, false), ImageFormat::Png);
    let cache = cache(
        FakeHost::default()
            .with(LOCAL, png.clone())
            .with("https://finna.fi/a", png),
    );

    let local = cache.get_or_refresh(LOCAL, None).await.unwrap();
    let remote = cache.get_or_refresh("https://finna.fi/a", None).await.unwrap();

    let decision = compare(&local, &remote);
    assert!(decision.same);
    assert_eq!(decision.phash_distance, Some(0));
    assert_eq!(decision.dhash_distance, Some(0));
}

#[tokio::test]
async fn test_inverted_image_does_not_match() {
    let cache = cache(
        FakeHost::default()
            .with(LOCAL, encode(&pattern(256, false), ImageFormat::Png))
            .with("https://finna.fi/b", encode(&pattern(256, true), ImageFormat::Png)),
    );

    let local = cache.get_or_refresh(LOCAL, None).await.unwrap();
    let remote = cache.get_or_refresh("https://finna.fi/b", None).await.unwrap();
    assert!(!same_image(&local, &remote));
}

#[tokio::test]
async fn test_uniform_image_never_matches() {
    let png = encode(&uniform(128), ImageFormat::Png);
    let cache = cache(FakeHost::default().with(LOCAL, png));

    let blank = cache.get_or_refresh(LOCAL, None).await.unwrap();
    assert!(!blank.is_valid());
    assert!(!same_image(&blank, &blank));
}

#[tokio::test]
async fn test_wider_hashes_are_not_compared_with_default() {
    let png = encode(&pattern(256, false), ImageFormat::Png);
    let hasher = FingerprintHasher::default();
    let wide = FingerprintHasher::new(16);

    let now = Utc::now();
    let a = hasher.fingerprint("a", &png, now).unwrap();
    let b = wide.fingerprint("b", &png, now).unwrap();
    assert_eq!(b.phash.width, 16);
    assert!(!same_image(&a, &b));
}

// ============================================================================
// Candidate Selection
// ============================================================================

#[tokio::test]
async fn test_first_matching_candidate_wins() {
    let original = pattern(256, false);
    let cache = cache(
        FakeHost::default()
            .with(LOCAL, encode(&original, ImageFormat::Png))
            .with("https://finna.fi/0", encode(&pattern(256, true), ImageFormat::Png))
            .with("https://finna.fi/1", encode(&original, ImageFormat::Png))
            .with("https://finna.fi/2", encode(&original, ImageFormat::Png)),
    );
    let local = cache.get_or_refresh(LOCAL, None).await.unwrap();
    let candidates: Vec<String> = (0..3).map(|i| format!("https://finna.fi/{i}")).collect();

    let outcome = find_matching_candidate(&cache, &local, &candidates, None)
        .await
        .unwrap();

    match outcome {
        CandidateMatch::Matched { url, index, .. } => {
            assert_eq!(url, "https://finna.fi/1");
            assert_eq!(index, 1);
        }
        other => panic!("expected a match, got {other:?}"),
    }
    // Local plus two candidates; the third is never fetched
    assert_eq!(cache.source().requests(), 3);
}

#[tokio::test]
async fn test_failed_candidate_is_skipped_and_not_cached() {
    let original = pattern(256, false);
    let cache = cache(
        FakeHost::default()
            .with(LOCAL, encode(&original, ImageFormat::Png))
            .with("https://finna.fi/ok", encode(&original, ImageFormat::Png)),
    );
    let local = cache.get_or_refresh(LOCAL, None).await.unwrap();
    let candidates = vec![
        "https://finna.fi/missing".to_string(),
        "https://finna.fi/ok".to_string(),
    ];

    let outcome = find_matching_candidate(&cache, &local, &candidates, None)
        .await
        .unwrap();
    assert!(matches!(outcome, CandidateMatch::Matched { index: 1, .. }));
    assert!(cache.cached("https://finna.fi/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_candidate_matches() {
    let cache = cache(
        FakeHost::default()
            .with(LOCAL, encode(&pattern(256, false), ImageFormat::Png))
            .with("https://finna.fi/x", encode(&pattern(256, true), ImageFormat::Png)),
    );
    let local = cache.get_or_refresh(LOCAL, None).await.unwrap();
    let candidates = vec![
        "https://finna.fi/x".to_string(),
        "https://finna.fi/gone".to_string(),
    ];

    let outcome = find_matching_candidate(&cache, &local, &candidates, None)
        .await
        .unwrap();
    assert_eq!(outcome, CandidateMatch::NoMatch { checked: 1, failed: 1 });

    let none = find_matching_candidate(&cache, &local, &[], None).await.unwrap();
    assert_eq!(none, CandidateMatch::NoCandidates);
}

#[tokio::test]
async fn test_reupload_refreshes_local_fingerprint() {
    let first = encode(&pattern(256, false), ImageFormat::Png);
    let cache = cache(FakeHost::default().with(LOCAL, first));
    let uploaded = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
    let reuploaded = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();

    let before = cache.get_or_refresh(LOCAL, Some(uploaded)).await.unwrap();
    let after = cache.get_or_refresh(LOCAL, Some(reuploaded)).await.unwrap();
    assert_eq!(cache.source().requests(), 2);
    assert_eq!(after.timestamp, reuploaded);
    assert_eq!(before.phash, after.phash);
}

// ============================================================================
// Re-encoding
// ============================================================================

#[test]
fn test_png_reencode_is_same_photograph() {
    let original = pattern(256, false);
    let hasher = FingerprintHasher::default();
    let now = Utc::now();

    let a = hasher
        .fingerprint("a", &encode(&original, ImageFormat::Png), now)
        .unwrap();
    let b = hasher
        .fingerprint("b", &encode(&original, ImageFormat::Tiff), now)
        .unwrap();
    assert!(same_image(&a, &b));
}

#[test]
fn test_jpeg_and_resize_distances() {
    let original = pattern(512, false);
    let hasher = FingerprintHasher::default();
    let now = Utc::now();
    let reference = hasher
        .fingerprint("original", &encode(&original, ImageFormat::Png), now)
        .unwrap();

    let (width, height) = original.dimensions();
    let resized = original.resize_exact(
        width / 2,
        height / 2,
        image::imageops::FilterType::Lanczos3,
    );

    for (label, bytes) in [
        ("jpeg 90", compress_jpeg(&original, 90)),
        ("jpeg 70", compress_jpeg(&original, 70)),
        ("resize 50%", encode(&resized, ImageFormat::Png)),
    ] {
        let other = hasher.fingerprint(label, &bytes, now).unwrap();
        let decision = compare(&reference, &other);
        // Informational: the catalog serves re-encoded derivatives
        println!(
            "{label}: phash {:?}, dhash {:?}, same {}",
            decision.phash_distance, decision.dhash_distance, decision.same
        );
        assert!(decision.phash_distance.is_some());
    }
}
