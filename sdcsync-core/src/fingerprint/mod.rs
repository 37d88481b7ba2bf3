//! Perceptual fingerprints for images.
//!
//! A fingerprint pairs two independent perceptual hashes of the same image:
//!
//! - **phash**: mean-thresholded DCT coefficients, robust to re-encoding and
//!   rescaling.
//! - **dhash**: horizontal gradient signs, robust to brightness and contrast
//!   changes.
//!
//! Both are computed over the same `width × width` grid. The width is part of
//! the fingerprint: hashes of different widths are never compared.
//!
//! # Usage
//!
//! ```no_run
//! use sdcsync_core::fingerprint::FingerprintHasher;
//!
//! let image_data = std::fs::read("image.jpg").unwrap();
//! let hasher = FingerprintHasher::new(8);
//! let fingerprint = hasher
//!     .fingerprint("https://example.org/image.jpg", &image_data, chrono::Utc::now())
//!     .unwrap();
//! assert!(fingerprint.is_valid());
//! ```

pub mod cache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub use cache::{FingerprintCache, FingerprintStore};

/// Default hash width, giving 64-bit hashes.
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Source of image bytes for fingerprinting.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Download the image at `url`.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: ImageSource + ?Sized> ImageSource for std::sync::Arc<T> {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_image(url).await
    }
}

/// One perceptual hash and the grid width it was computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashValue {
    pub width: u32,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl HashValue {
    pub fn new(width: u32, bytes: Vec<u8>) -> Self {
        Self { width, bytes }
    }

    pub fn from_hex(width: u32, hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| SyncError::PerceptualHashError(format!("Invalid hex string: {e}")))?;
        Ok(Self { width, bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// An all-zero hash comes from a blank or unreadable image.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Bits differing from `other`, or `None` if the widths differ.
    pub fn distance(&self, other: &Self) -> Option<u32> {
        if self.width != other.width {
            return None;
        }
        hamming_distance(&self.bytes, &other.bytes)
    }
}

/// Visual signature of the image at `url`, as of `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualFingerprint {
    pub url: String,
    pub phash: HashValue,
    pub dhash: HashValue,
    pub timestamp: DateTime<Utc>,
}

impl PerceptualFingerprint {
    /// False when either hash is all zeros. Such a fingerprint never matches
    /// anything.
    pub fn is_valid(&self) -> bool {
        !self.phash.is_zero() && !self.dhash.is_zero()
    }
}

/// Computes both hashes of a fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintHasher {
    hash_size: u32,
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SIZE)
    }
}

impl FingerprintHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Decode image bytes and hash them.
    ///
    /// Supports JPEG, PNG, GIF, WebP and TIFF.
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<(HashValue, HashValue)> {
        let image = image::load_from_memory(image_data).map_err(|e| {
            SyncError::PerceptualHashError(format!("Failed to decode image: {e}"))
        })?;
        Ok(self.hash_image(&image))
    }

    /// Returns `(phash, dhash)`.
    pub fn hash_image(&self, image: &DynamicImage) -> (HashValue, HashValue) {
        let width = self.hash_size;

        let phasher = HasherConfig::new()
            .hash_size(width, width)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        let dhasher = HasherConfig::new()
            .hash_size(width, width)
            .hash_alg(HashAlg::Gradient)
            .to_hasher();

        let phash = phasher.hash_image(image);
        let dhash = dhasher.hash_image(image);

        (
            HashValue::new(width, phash.as_bytes().to_vec()),
            HashValue::new(width, dhash.as_bytes().to_vec()),
        )
    }

    pub fn fingerprint(
        &self,
        url: &str,
        image_data: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<PerceptualFingerprint> {
        let (phash, dhash) = self.hash_bytes(image_data)?;
        Ok(PerceptualFingerprint {
            url: url.to_string(),
            phash,
            dhash,
            timestamp,
        })
    }
}

/// Number of differing bits between two equal-length hashes.
///
/// Returns `None` if the lengths differ or either hash is empty.
pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Option<u32> {
    if hash1.is_empty() || hash1.len() != hash2.len() {
        return None;
    }
    Some(
        hash1
            .iter()
            .zip(hash2)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum(),
    )
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
