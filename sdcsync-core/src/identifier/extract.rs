//! Identifier extraction from free-text source fields.
//!
//! Source fields on file pages are hand-edited: URLs are mixed with wiki
//! markup, HTML and prose, and several citations may follow each other. The
//! scanner here first cuts the text into URLs and then applies one
//! extraction rule per recognised domain.

use serde::Serialize;
use tracing::debug;

use super::quote::unquote;

/// Characters that terminate a URL inside a source field.
const URL_STOP_CHARS: &[u8] = b" ]|}{<,)\n";

/// Substrings that terminate an identifier, checked in this order.
const ID_STOP_PATTERNS: &[&str] = &[
    " ", ", ", ")", "<", ">", "[", "]", "{", "}", "|", "*", "&", "#", "?",
];

/// Kind of raw identifier found in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ExtractedId {
    /// `.../Record/<id>` on the catalog domain.
    Record(String),
    /// `id=<id>` on one of the catalog's download/cover/thumbnail endpoints.
    QueryId(String),
    /// Final path segment on the legacy image-gallery domain.
    LegacyGallery(String),
    /// Accession number (`si=`) on the museum-inventory domain.
    Accession(String),
    /// Object id (`/object/<id>`) on the gallery-object domain.
    GalleryObject(String),
}

impl ExtractedId {
    pub fn value(&self) -> &str {
        match self {
            Self::Record(id)
            | Self::QueryId(id)
            | Self::LegacyGallery(id)
            | Self::Accession(id)
            | Self::GalleryObject(id) => id,
        }
    }
}

/// Find where the next URL begins, starting at byte offset `from`.
///
/// Only a literal `http://` or `https://` prefix counts (case-insensitive),
/// so a bare `http` inside an encoded redirect parameter is skipped.
pub fn find_url_begin(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let last = bytes.len() - 1;
    let mut cursor = from;

    while cursor < last {
        let index = find_ascii_ci(bytes, b"http", cursor)?;
        if last - index < 8 {
            // Too little left for a usable URL
            return None;
        }
        if bytes[index..index + 7].eq_ignore_ascii_case(b"http://")
            || bytes[index..index + 8].eq_ignore_ascii_case(b"https://")
        {
            return Some(index);
        }
        cursor = index + 4;
    }
    None
}

/// Find where a URL starting at `begin` ends: the first stop character, or
/// the end of the text.
pub fn find_url_end(source: &str, begin: usize) -> usize {
    source.as_bytes()[begin..]
        .iter()
        .position(|b| URL_STOP_CHARS.contains(b))
        .map_or(source.len(), |offset| begin + offset)
}

/// All URLs embedded in a source field, in order of appearance.
pub fn urls_from_source(source: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut index = 0;

    while index < source.len() {
        let Some(begin) = find_url_begin(source, index) else {
            break;
        };
        let end = find_url_end(source, begin);
        let url = &source[begin..end];
        debug!(url, "Source has url");
        urls.push(url.to_string());
        index = end;
    }
    urls
}

/// Strip trailing free-text contamination from a raw identifier.
pub fn strip_id(raw: &str) -> &str {
    let mut id = raw;
    for pattern in ID_STOP_PATTERNS {
        if let Some(index) = id.find(pattern) {
            id = &id[..index];
        }
    }
    id.strip_suffix('\n').unwrap_or(id)
}

/// Text left of the first `delimiter`, or the whole string when the
/// delimiter is absent or leading.
pub fn left_of(value: &str, delimiter: char) -> &str {
    match value.find(delimiter) {
        Some(index) if index > 0 => &value[..index],
        _ => value,
    }
}

/// `.../Record/<id>`; the `/Record/DownloadFile` endpoint is left to
/// [`query_id`].
pub fn record_id(url: &str) -> Option<String> {
    if url.contains("/Record/DownloadFile") {
        return None;
    }
    let (_, rest) = url.split_once("/Record/")?;
    non_empty(strip_id(rest))
}

/// Value of the `id=` query parameter.
pub fn query_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("id=")?;
    non_empty(strip_id(rest))
}

/// Final path segment of a legacy image-gallery URL, minus a non-numeric
/// file extension.
pub fn legacy_gallery_id(url: &str) -> Option<String> {
    // A trailing slash is not a separator of its own
    let search_end = url.char_indices().last().map_or(0, |(i, _)| i);
    let slash = url[..search_end].rfind('/')?;
    let segment = &url[slash + 1..];
    let segment = segment.strip_suffix('\n').unwrap_or(segment);

    let id = match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let suffix = &segment[dot + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                segment
            } else {
                &segment[..dot]
            }
        }
        _ => segment,
    };
    non_empty(id)
}

/// Accession number from the museum-inventory `si=` parameter.
///
/// `-` and `+` both stand for spaces in these legacy links:
/// `app?si=A-1995-96` is accession `A 1995 96`.
pub fn accession_number(url: &str) -> Option<String> {
    if !url.contains("fng.fi") {
        return None;
    }
    let (_, rest) = url.split_once("si=")?;
    let decoded = unquote(strip_id(rest));
    let accession = decoded.replace(['-', '+'], " ");
    debug!(accession = %accession, "Accession number from inventory url");
    non_empty(&accession)
}

/// Object id from a gallery-object URL (`/object/<id>`).
pub fn gallery_object_id(url: &str) -> Option<String> {
    if !url.contains("kansallisgalleria.fi") {
        return None;
    }
    let (_, rest) = url.split_once("/object/")?;
    non_empty(strip_id(rest))
}

/// Apply the extraction rule for the URL's domain.
///
/// Returns `None` when the domain is not recognised or the rule finds
/// nothing; callers treat that as "no identifier resolved".
pub fn extract_identifier(url: &str) -> Option<ExtractedId> {
    if url.contains("elonet.finna.fi") {
        return None;
    }
    if url.contains("fng.fi") {
        return accession_number(url).map(ExtractedId::Accession);
    }
    if url.contains("kansallisgalleria.fi") {
        return gallery_object_id(url).map(ExtractedId::GalleryObject);
    }
    if url.contains("kuvakokoelmat.fi") {
        return legacy_gallery_id(url).map(ExtractedId::LegacyGallery);
    }
    if url.contains("finna.fi") {
        return record_id(url)
            .map(ExtractedId::Record)
            .or_else(|| query_id(url).map(ExtractedId::QueryId));
    }
    None
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Case-insensitive ASCII substring search starting at `from`.
fn find_ascii_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|offset| from + offset)
}
