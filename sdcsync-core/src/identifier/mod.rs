//! Catalog identifiers: extraction, quoting, migration and resolution.
//!
//! A file page cites its catalog record through one or more URLs in the
//! Source field. [`SourceIdentifiers::from_urls`] collects the raw ids found
//! per URL kind and [`SourceIdentifiers::resolve_identifier`] picks the one
//! to query the record API with.

pub mod extract;
pub mod migrate;
pub mod quote;

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

pub use extract::{extract_identifier, strip_id, urls_from_source, ExtractedId};
pub use migrate::{migrate_legacy_id, resolve_current_id, PageSource};
pub use quote::{api_query_id, quote_path, unquote};

use crate::error::{Result, SyncError};

/// Characters that must never survive into a normalized identifier.
pub const MARKUP_CHARS: &[char] = &['[', ']', '{', '}', '|', '<', '>', '#', '?', '&'];

/// Identifiers outside this length range are probably parse errors.
const PLAUSIBLE_LENGTH: std::ops::RangeInclusive<usize> = 5..=50;

/// Identifier naming convention, decided by prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Pre-migration museum ids (`musketti.`). Obsolete.
    Musketti,
    /// Current museum ids (`museovirasto.`).
    Museovirasto,
    /// City museum ids (`hkm.`); the `hkm.HKM` sub-scheme is obsolete.
    Hkm,
    /// Literature society ids (`sls.`). Their encoding is unreliable.
    Sls,
    /// Ids that may arrive with a pre-encoded `%2F` (`fmp.`).
    Fmp,
    Other,
}

impl IdScheme {
    pub fn of(id: &str) -> Self {
        if id.starts_with("musketti.") {
            Self::Musketti
        } else if id.starts_with("museovirasto.") {
            Self::Museovirasto
        } else if id.starts_with("hkm.") {
            Self::Hkm
        } else if id.starts_with("sls.") {
            Self::Sls
        } else if id.starts_with("fmp.") {
            Self::Fmp
        } else {
            Self::Other
        }
    }
}

/// A normalized catalog record identifier.
///
/// Non-empty and free of wiki-markup control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Normalize a raw id.
    ///
    /// Embedded newlines truncate, leftover markup is stripped again, and an
    /// implausible length only produces a warning.
    pub fn new(raw: &str) -> Result<Self> {
        let mut id = raw.trim();
        if let Some(newline) = id.find('\n') {
            id = &id[..newline];
        }
        if id.contains(MARKUP_CHARS) {
            debug!(id, "Identifier still contains markup, stripping");
            id = strip_id(id);
        }
        if id.is_empty() || id.contains(MARKUP_CHARS) {
            return Err(SyncError::ParseFailure(format!(
                "not a usable identifier: {raw:?}"
            )));
        }
        if !PLAUSIBLE_LENGTH.contains(&id.chars().count()) {
            warn!(id, len = id.len(), "Identifier length is suspicious");
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> IdScheme {
        IdScheme::of(&self.0)
    }

    /// Whether the catalog has renumbered ids of this scheme, so the current
    /// id has to be scraped from the record page.
    pub fn is_obsolete(&self) -> bool {
        match self.scheme() {
            IdScheme::Musketti => true,
            IdScheme::Hkm => self.0.starts_with("hkm.HKM"),
            _ => false,
        }
    }

    /// Encoded form for the record API `id=` parameter.
    pub fn api_query(&self) -> String {
        api_query_id(&self.0)
    }

    /// Public record page URL.
    pub fn record_url(&self, record_base: &str) -> String {
        format!("{record_base}{}", self.0)
    }

    /// The id one level unquoted, as it is written into claims.
    pub fn unquoted(&self) -> String {
        unquote(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Raw ids collected from the URLs of one source field.
///
/// When several URLs of the same kind are present the later one wins: an old
/// citation is typically followed by its replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceIdentifiers {
    pub record_id: Option<String>,
    pub query_id: Option<String>,
    pub legacy_gallery_id: Option<String>,
    pub accession_number: Option<String>,
    pub gallery_object_id: Option<String>,
}

impl SourceIdentifiers {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Self::default();
        for url in urls {
            let url = url.as_ref();
            let Some(found) = extract_identifier(url) else {
                continue;
            };
            debug!(url, id = found.value(), "Identifier from url");
            let slot = match &found {
                ExtractedId::Record(_) => &mut ids.record_id,
                ExtractedId::QueryId(_) => &mut ids.query_id,
                ExtractedId::LegacyGallery(_) => &mut ids.legacy_gallery_id,
                ExtractedId::Accession(_) => &mut ids.accession_number,
                ExtractedId::GalleryObject(_) => &mut ids.gallery_object_id,
            };
            *slot = Some(found.value().to_string());
        }
        ids
    }

    /// Convenience for a whole source field.
    pub fn from_source(source: &str) -> Self {
        Self::from_urls(urls_from_source(source))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Pick the catalog identifier: record id, then query id, then the
    /// migrated legacy gallery id.
    pub fn resolve_identifier(&self) -> Result<Identifier> {
        let candidate = if let Some(id) = &self.record_id {
            id.clone()
        } else if let Some(id) = &self.query_id {
            id.clone()
        } else if let Some(legacy) = &self.legacy_gallery_id {
            let migrated = migrate_legacy_id(legacy);
            if migrated.is_empty() {
                return Err(SyncError::ParseFailure(format!(
                    "legacy gallery id {legacy} has no known prefix"
                )));
            }
            quote_path(&migrated)
        } else {
            return Err(SyncError::ParseFailure(
                "no catalog identifier in source".to_string(),
            ));
        };

        if candidate.contains("profium.com") {
            return Err(SyncError::ParseFailure(format!(
                "identifier points at a redirector: {candidate}"
            )));
        }
        Identifier::new(&candidate)
    }
}
