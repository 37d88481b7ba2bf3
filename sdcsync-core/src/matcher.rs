//! Image identity decisions.
//!
//! Two fingerprints describe the same photograph when their hamming
//! distances `d_p` (phash) and `d_d` (dhash) satisfy one of:
//!
//! | rule | condition |
//! |---|---|
//! | exact phash | `d_p == 0 && d_d < 4` |
//! | exact dhash | `d_p < 4 && d_d == 0` |
//! | combined drift | `d_p + d_d <= 8` |
//!
//! The tolerance is intentionally not symmetric in its parts: exact
//! agreement on one hash buys slack on the other only up to 3 bits, while
//! small drift on both is accepted up to 8 bits in total.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fingerprint::{FingerprintCache, ImageSource, PerceptualFingerprint};

/// Outcome of one fingerprint comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchDecision {
    pub same: bool,
    /// `None` when the hashes could not be compared.
    pub phash_distance: Option<u32>,
    pub dhash_distance: Option<u32>,
}

impl MatchDecision {
    fn rejected() -> Self {
        Self {
            same: false,
            phash_distance: None,
            dhash_distance: None,
        }
    }
}

/// The distance policy on its own.
pub fn is_match(phash_distance: u32, dhash_distance: u32) -> bool {
    (phash_distance == 0 && dhash_distance < 4)
        || (phash_distance < 4 && dhash_distance == 0)
        || phash_distance + dhash_distance <= 8
}

/// Compare two fingerprints.
///
/// Fails closed: mismatched widths and all-zero hashes give `same == false`
/// without distances.
pub fn compare(a: &PerceptualFingerprint, b: &PerceptualFingerprint) -> MatchDecision {
    if a.phash.width != b.phash.width || a.dhash.width != b.dhash.width {
        warn!(
            a = %a.url,
            b = %b.url,
            a_widths = ?(a.phash.width, a.dhash.width),
            b_widths = ?(b.phash.width, b.dhash.width),
            "Hash width mismatch, cannot compare"
        );
        return MatchDecision::rejected();
    }
    if !a.is_valid() || !b.is_valid() {
        warn!(a = %a.url, b = %b.url, "Zero hash, source image unreadable");
        return MatchDecision::rejected();
    }

    let (Some(phash_distance), Some(dhash_distance)) =
        (a.phash.distance(&b.phash), a.dhash.distance(&b.dhash))
    else {
        warn!(a = %a.url, b = %b.url, "Hash length mismatch, cannot compare");
        return MatchDecision::rejected();
    };

    let same = is_match(phash_distance, dhash_distance);
    debug!(
        a = %a.url,
        b = %b.url,
        phash_distance,
        dhash_distance,
        same,
        "Compared fingerprints"
    );
    MatchDecision {
        same,
        phash_distance: Some(phash_distance),
        dhash_distance: Some(dhash_distance),
    }
}

pub fn same_image(a: &PerceptualFingerprint, b: &PerceptualFingerprint) -> bool {
    compare(a, b).same
}

/// Result of checking a record's images against the local image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateMatch {
    /// The record lists no images.
    NoCandidates,
    /// Every candidate was checked (or could not be fetched) without a match.
    NoMatch { checked: usize, failed: usize },
    Matched {
        url: String,
        index: usize,
        decision: MatchDecision,
    },
}

/// Walk the candidates in listed order and return the first one that
/// matches `local`. Later candidates are not fetched.
///
/// A candidate whose download or decoding fails is skipped; the failure is
/// not cached and the candidate is retried on the next run.
pub async fn find_matching_candidate<S: ImageSource>(
    cache: &FingerprintCache<S>,
    local: &PerceptualFingerprint,
    candidates: &[String],
    last_modified: Option<DateTime<Utc>>,
) -> Result<CandidateMatch> {
    if candidates.is_empty() {
        return Ok(CandidateMatch::NoCandidates);
    }

    let mut checked = 0;
    let mut failed = 0;
    for (index, url) in candidates.iter().enumerate() {
        let remote = match cache.get_or_refresh(url, last_modified).await {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                warn!(url = %url, error = %err, "Skipping candidate image");
                failed += 1;
                continue;
            }
        };
        checked += 1;

        let decision = compare(local, &remote);
        if decision.same {
            info!(
                url = %url,
                index,
                phash_distance = ?decision.phash_distance,
                dhash_distance = ?decision.dhash_distance,
                "Candidate image matches"
            );
            return Ok(CandidateMatch::Matched {
                url: url.clone(),
                index,
                decision,
            });
        }
    }

    info!(checked, failed, "No candidate image matches");
    Ok(CandidateMatch::NoMatch { checked, failed })
}
