//! Migration of obsolete identifiers to the current catalog scheme.
//!
//! Two kinds of staleness exist:
//!
//! - **Legacy gallery ids** (`HK7155_219-65-1`) predate the catalog. They are
//!   rewritten offline by prefix-specific rules into `musketti.` ids.
//! - **Renumbered catalog ids** (`musketti.`, `hkm.HKM`) still resolve to a
//!   record page, but the record API only answers to the current id. The
//!   current id is scraped from the record page.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::extract::left_of;
use crate::error::Result;

/// Scheme prefix prepended to every migrated legacy gallery id.
pub const MIGRATED_PREFIX: &str = "musketti.M012:";

/// Source of public record pages, used to scrape current identifiers.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page body as text.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for std::sync::Arc<T> {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        (**self).fetch_page(url).await
    }
}

/// Rewrite a legacy gallery id into the current scheme.
///
/// Returns an empty string for ids outside the recognised prefix families;
/// the prefix list is an allow-list.
///
/// | prefix | rewrite |
/// |---|---|
/// | `HK` | first `_` → `:`, remaining `_` → `-` (at least one `_` required) |
/// | `JOKA` | last `_` → `:` |
/// | `SUK`, `SMK`, `KK`, `VKK` | every `_` → `:` |
/// | digit `1` | prefix `HK`, then every `_` → `:` |
pub fn migrate_legacy_id(legacy: &str) -> String {
    if legacy.is_empty() {
        debug!("Empty legacy id");
        return String::new();
    }

    let mut id = if let Some(rest) = legacy.strip_prefix("HK") {
        let Some((head, tail)) = rest.split_once('_') else {
            debug!(legacy, "Legacy HK id has no underscores");
            return String::new();
        };
        format!("HK{head}:{}", tail.replace('_', "-"))
    } else if legacy.starts_with("JOKA") {
        colon_last_underscore(legacy)
    } else if ["SUK", "SMK", "KK", "VKK"]
        .iter()
        .any(|prefix| legacy.starts_with(prefix))
    {
        legacy.replace('_', ":")
    } else if legacy.starts_with('1') {
        format!("HK{}", legacy.replace('_', ":"))
    } else {
        debug!(legacy, "Legacy id does not start with a known prefix");
        return String::new();
    };

    // Anything after a fragment marker is not part of the id
    id = left_of(&id, '#').to_string();

    format!("{MIGRATED_PREFIX}{id}")
}

fn colon_last_underscore(id: &str) -> String {
    // The final character is never treated as a separator
    let search_end = id.char_indices().last().map_or(0, |(i, _)| i);
    match id[..search_end].rfind('_') {
        Some(index) if index > 0 => format!("{}:{}", &id[..index], &id[index + 1..]),
        _ => id.to_string(),
    }
}

/// Scrape the current id from the embedded, HTML-entity-encoded record API
/// URL on a record page:
/// `https&#x3A;&#x2F;&#x2F;api.finna.fi&#x2F;v1&#x2F;record&#x3F;id&#x3D;<id>&#x26;...`
pub fn parse_api_id_from_page(page: &str) -> Option<String> {
    let start = page.find(";api.finna.fi&")?;
    let page = &page[start..];

    page.find("id")?;
    let value_start = page.find("&#x3D;")? + "&#x3D;".len();
    let page = &page[value_start..];

    let value_end = page.find('"').or_else(|| page.find('>'))?;
    let value = page[..value_end].replace("&#x25;3A", ":");

    let id_end = value.find("&amp").or_else(|| value.find('&'))?;
    let id = &value[..id_end];
    (!id.is_empty()).then(|| id.to_string())
}

/// Scrape the current id from a `data-record-id="..."` attribute.
pub fn parse_data_record_id_from_page(page: &str) -> Option<String> {
    const ATTRIBUTE: &str = "data-record-id=\"";
    let start = page.find(ATTRIBUTE)? + ATTRIBUTE.len();
    let end = page[start..].find('"')? + start;
    let id = &page[start..end];
    (!id.is_empty()).then(|| id.to_string())
}

/// Fetch the record page and scrape the current identifier from it.
///
/// Returns `Ok(None)` when the page was fetched but neither scraping
/// strategy found an id; callers must skip the page rather than guess.
#[instrument(skip(pages))]
pub async fn resolve_current_id<P: PageSource + ?Sized>(
    pages: &P,
    record_url: &str,
) -> Result<Option<String>> {
    let page = pages.fetch_page(record_url).await?;

    let scraped =
        parse_api_id_from_page(&page).or_else(|| parse_data_record_id_from_page(&page));

    let Some(id) = scraped else {
        warn!(url = record_url, "No current id found on record page");
        return Ok(None);
    };

    let id = left_of(&id, '\n').trim_end().to_string();
    if !(id.starts_with("museovirasto.") || id.starts_with("hkm.")) {
        warn!(id = %id, url = record_url, "Unexpected scheme for current id");
    }
    info!(id = %id, url = record_url, "Resolved current id from record page");
    Ok(Some(id))
}
