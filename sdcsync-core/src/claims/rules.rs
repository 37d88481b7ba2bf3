//! Claim reconciliation rules.
//!
//! Each rule compares one catalog fact against the existing claims and
//! reports whether the fact is already there. Each has a paired builder
//! producing the claim to add when it is not. Rules never remove or rewrite
//! existing claims; local edits are authoritative.

use serde::Serialize;
use tracing::{debug, warn};

use super::{property, ClaimDescriptor, ClaimValue, ExistingClaimSet, FILE_AVAILABLE_ON_INTERNET};
use crate::catalog::facts::{license_code, LICENSE_PDM, STATUS_RIGHTS_WAIVED};
use crate::catalog::PartialDate;
use crate::error::{Result, SyncError};
use crate::identifier::quote::{unquote, unquote_plus};
use crate::identifier::IdScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Absent,
    Present,
    /// The claim exists but lacks a qualifier or reference. Reported only;
    /// claims are submitted whole, so nothing is patched.
    PresentButIncomplete,
}

impl ClaimStatus {
    pub fn is_absent(self) -> bool {
        self == Self::Absent
    }
}

/// License rule. Licenses outside the allow-list are a policy failure.
pub fn license_status(claims: &ExistingClaimSet, license: &str, record_url: &str) -> Result<ClaimStatus> {
    let code = supported_license_code(license)?;

    let matching: Vec<_> = claims
        .statements(property::LICENSE)
        .iter()
        .filter(|s| s.mainsnak.item_id().as_deref() == Some(code))
        .collect();

    if matching.is_empty() {
        return Ok(ClaimStatus::Absent);
    }
    if matching
        .iter()
        .any(|s| s.has_reference(property::REFERENCE_URL, record_url))
    {
        Ok(ClaimStatus::Present)
    } else {
        debug!(license, record_url, "License present without reference url");
        Ok(ClaimStatus::PresentButIncomplete)
    }
}

pub fn build_license_claim(license: &str, record_url: &str) -> Result<ClaimDescriptor> {
    let code = supported_license_code(license)?;
    Ok(
        ClaimDescriptor::new(property::LICENSE, ClaimValue::Item(code.to_string()))
            .with_reference_url(record_url),
    )
}

fn supported_license_code(license: &str) -> Result<&'static str> {
    license_code(license).ok_or_else(|| {
        warn!(license, "Unsupported license");
        SyncError::PolicyFailure(format!("unsupported license: {license}"))
    })
}

/// Copyright status rule.
///
/// Only the waived-rights status under the public domain mark is written.
/// Any other combination needs human judgment and is a policy failure.
pub fn copyright_status_status(
    claims: &ExistingClaimSet,
    license: &str,
    status: &str,
) -> Result<ClaimStatus> {
    ensure_writable_status(license, status)?;
    let present = claims
        .item_targets(property::COPYRIGHT_STATUS)
        .iter()
        .any(|target| target == status);
    Ok(if present {
        ClaimStatus::Present
    } else {
        ClaimStatus::Absent
    })
}

pub fn build_copyright_status_claim(
    license: &str,
    status: &str,
    record_url: &str,
) -> Result<ClaimDescriptor> {
    ensure_writable_status(license, status)?;
    Ok(
        ClaimDescriptor::new(property::COPYRIGHT_STATUS, ClaimValue::Item(status.to_string()))
            .with_reference_url(record_url),
    )
}

fn ensure_writable_status(license: &str, status: &str) -> Result<()> {
    if license == LICENSE_PDM && status == STATUS_RIGHTS_WAIVED {
        return Ok(());
    }
    debug!(license, status, "Copyright status left unset");
    Err(SyncError::PolicyFailure(format!(
        "copyright status {status} under license {license} is not written"
    )))
}

/// Whether an existing catalog id claim `target` names the same record as
/// `id`.
///
/// The repository and the catalog disagree on quoting, so the id is
/// compared as-is, fully unquoted and one level unquoted. Literature
/// society ids are considered equal whenever both sides are of that
/// family; their quoting cannot be compared reliably.
pub fn catalog_id_matches(target: &str, id: &str) -> bool {
    if target == id {
        return true;
    }
    let unquoted_id = unquote_plus(&id.replace("%25", "%"));
    let unquoted_target = unquote_plus(target);
    if unquoted_target == unquoted_id || unquoted_target == id || target == unquoted_id {
        debug!(target, id, "Catalog id matches after unquoting");
        return true;
    }
    if IdScheme::of(id) == IdScheme::Sls && IdScheme::of(target) == IdScheme::Sls {
        debug!(target, id, "Literature society id present, not comparing");
        return true;
    }
    false
}

pub fn catalog_id_status(claims: &ExistingClaimSet, id: &str) -> ClaimStatus {
    let present = claims
        .string_targets(property::CATALOG_ID)
        .into_iter()
        .any(|target| catalog_id_matches(target, id));
    if present {
        ClaimStatus::Present
    } else {
        ClaimStatus::Absent
    }
}

/// The claim value is the id one level unquoted.
pub fn build_catalog_id_claim(id: &str) -> ClaimDescriptor {
    ClaimDescriptor::new(property::CATALOG_ID, ClaimValue::String(unquote(id)))
}

/// Inception rule: first write wins. Any existing inception, at any
/// precision, counts as present.
pub fn inception_status(claims: &ExistingClaimSet, date: &PartialDate) -> ClaimStatus {
    let existing = claims.statements(property::INCEPTION);
    if existing.is_empty() {
        return ClaimStatus::Absent;
    }
    let wanted = date.to_wikibase_time();
    if !existing
        .iter()
        .any(|s| s.mainsnak.time_value() == Some(wanted.as_str()))
    {
        debug!(inception = %wanted, "Different inception exists, keeping it");
    }
    ClaimStatus::Present
}

pub fn build_inception_claim(date: &PartialDate, record_url: &str) -> ClaimDescriptor {
    ClaimDescriptor::new(property::INCEPTION, ClaimValue::Time(*date)).with_reference_url(record_url)
}

/// Collection codes from the catalog that have no claim yet, in order.
pub fn missing_collections(claims: &ExistingClaimSet, codes: &[String]) -> Vec<String> {
    codes
        .iter()
        .filter(|code| collection_status(claims, code).is_absent())
        .cloned()
        .collect()
}

pub fn collection_status(claims: &ExistingClaimSet, code: &str) -> ClaimStatus {
    if claims
        .item_targets(property::COLLECTION)
        .iter()
        .any(|target| target == code)
    {
        ClaimStatus::Present
    } else {
        ClaimStatus::Absent
    }
}

/// MIME type claim, written first to a file that has no statements.
pub fn build_mime_type_claim(mime: &str) -> ClaimDescriptor {
    ClaimDescriptor::new(property::MIME_TYPE, ClaimValue::String(mime.to_string()))
}

pub fn build_collection_claim(code: &str) -> ClaimDescriptor {
    ClaimDescriptor::new(property::COLLECTION, ClaimValue::Item(code.to_string()))
}

/// Gallery artwork ids are compared as exact strings.
pub fn gallery_artwork_status(claims: &ExistingClaimSet, object_id: &str) -> ClaimStatus {
    if claims
        .string_targets(property::GALLERY_ARTWORK_ID)
        .contains(&object_id)
    {
        ClaimStatus::Present
    } else {
        ClaimStatus::Absent
    }
}

pub fn build_gallery_artwork_claim(object_id: &str) -> ClaimDescriptor {
    ClaimDescriptor::new(
        property::GALLERY_ARTWORK_ID,
        ClaimValue::String(object_id.to_string()),
    )
}

/// Source-of-file rule.
///
/// A "file available on the internet" claim describing the record URL, or
/// naming the operator, is the source. It is incomplete when the publisher
/// qualifier is missing from every such claim.
pub fn source_of_file_status(
    claims: &ExistingClaimSet,
    record_url: &str,
    operator: &str,
    publisher: Option<&str>,
) -> ClaimStatus {
    let sources: Vec<_> = claims
        .statements(property::SOURCE_OF_FILE)
        .iter()
        .filter(|s| s.mainsnak.item_id().as_deref() == Some(FILE_AVAILABLE_ON_INTERNET))
        .filter(|s| {
            s.has_string_qualifier(property::DESCRIBED_AT_URL, record_url)
                || s.has_item_qualifier(property::OPERATOR, operator)
        })
        .collect();

    if sources.is_empty() {
        return ClaimStatus::Absent;
    }
    match publisher {
        Some(publisher)
            if !sources
                .iter()
                .any(|s| s.has_item_qualifier(property::PUBLISHER, publisher)) =>
        {
            debug!(publisher, "Source of file lacks publisher");
            ClaimStatus::PresentButIncomplete
        }
        _ => ClaimStatus::Present,
    }
}

/// One source-of-file claim carrying URL, operator and (when known)
/// publisher qualifiers.
pub fn build_source_of_file_claim(
    record_url: &str,
    operator: &str,
    publisher: Option<&str>,
) -> ClaimDescriptor {
    let claim = ClaimDescriptor::new(
        property::SOURCE_OF_FILE,
        ClaimValue::Item(FILE_AVAILABLE_ON_INTERNET.to_string()),
    )
    .with_qualifier(
        property::DESCRIBED_AT_URL,
        ClaimValue::String(record_url.to_string()),
    )
    .with_qualifier(property::OPERATOR, ClaimValue::Item(operator.to_string()));

    match publisher {
        Some(publisher) => {
            claim.with_qualifier(property::PUBLISHER, ClaimValue::Item(publisher.to_string()))
        }
        None => claim,
    }
}
