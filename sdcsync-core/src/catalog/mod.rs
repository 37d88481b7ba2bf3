//! Catalog record API.
//!
//! The record endpoint answers `GET {api}/record?id=<id>&field[]=...` with an
//! envelope:
//!
//! ```json
//! { "status": "OK", "resultCount": 1, "records": [ { "id": "...", ... } ] }
//! ```
//!
//! Only an envelope with status `OK`, exactly one result and a non-empty
//! record list is usable; see [`is_record_ok`].

pub mod facts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::identifier::Identifier;

pub use facts::{CatalogFact, CatalogFacts, PartialDate};

/// Fields requested for every record.
pub const RECORD_FIELDS: &[&str] = &[
    "id",
    "title",
    "subTitle",
    "shortTitle",
    "summary",
    "imageRights",
    "images",
    "imagesExtended",
    "openUrl",
    "nonPresenterAuthors",
    "onlineUrls",
    "subjects",
    "subjectPlaces",
    "subjectActors",
    "subjectDetails",
    "buildings",
    "identifierString",
    "collections",
    "institutions",
    "classifications",
    "events",
    "languages",
    "originalLanguages",
    "year",
    "formats",
    "measurements",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "resultCount", default)]
    pub result_count: i64,
    #[serde(default)]
    pub records: Vec<CatalogRecord>,
}

impl RecordResponse {
    /// The single record of a usable response.
    pub fn record(&self) -> Option<&CatalogRecord> {
        is_record_ok(self).then(|| self.records.first()).flatten()
    }
}

/// The subset of record fields the reconciliation reads. Everything else
/// is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub images_extended: Option<Vec<ImageExtended>>,
    #[serde(default)]
    pub collections: Option<Vec<Value>>,
    #[serde(default)]
    pub institutions: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub buildings: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub subjects: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageExtended {
    #[serde(default)]
    pub urls: ImageUrls,
    #[serde(default)]
    pub rights: ImageRights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRights {
    pub copyright: Option<String>,
}

impl CatalogRecord {
    /// First extended image entry; a record without one cannot be verified.
    pub fn primary_image(&self) -> Option<&ImageExtended> {
        self.images_extended.as_ref()?.first()
    }
}

/// Whether a response can be trusted at all.
///
/// Any status other than `OK`, any count other than one, or an empty record
/// list makes the record unusable. Zero results is not treated differently
/// from an error.
pub fn is_record_ok(response: &RecordResponse) -> bool {
    if response.status != "OK" {
        warn!(status = %response.status, "Record status not OK");
        return false;
    }
    if response.result_count != 1 {
        warn!(count = response.result_count, "Record resultCount not 1");
        return false;
    }
    if response.records.is_empty() {
        warn!("Empty array of records");
        return false;
    }
    true
}

/// Catalog images to compare against the local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCandidates {
    /// The record has no `imagesExtended`; nothing can be verified.
    Unverifiable,
    /// The record lists no images.
    NoImages,
    Urls(Vec<String>),
}

/// Candidate image URLs in the record's listed order.
///
/// A single image is compared at its large size; for several images the
/// `images` list gives the candidates.
pub fn image_candidates(record: &CatalogRecord, image_base: &str) -> ImageCandidates {
    let Some(primary) = record.primary_image() else {
        return ImageCandidates::Unverifiable;
    };

    match record.images.len() {
        0 => ImageCandidates::NoImages,
        1 => match &primary.urls.large {
            Some(large) => ImageCandidates::Urls(vec![format!("{image_base}{large}")]),
            None => ImageCandidates::Urls(vec![format!("{image_base}{}", record.images[0])]),
        },
        _ => ImageCandidates::Urls(
            record
                .images
                .iter()
                .map(|image| format!("{image_base}{image}"))
                .collect(),
        ),
    }
}

/// Record API URL for `id` with the standard field list.
pub fn record_request_url(api_url: &str, id: &Identifier) -> String {
    let mut url = format!("{api_url}/record?id={}", id.api_query());
    for field in RECORD_FIELDS {
        url.push_str("&field%5B%5D=");
        url.push_str(field);
    }
    url
}

/// Read access to catalog records.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_record(&self, id: &Identifier) -> Result<RecordResponse>;
}

#[cfg(feature = "network")]
pub use client::FinnaClient;

#[cfg(feature = "network")]
mod client {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tracing::{debug, instrument};

    use super::{record_request_url, CatalogApi, RecordResponse};
    use crate::error::Result;
    use crate::http::HttpFetcher;
    use crate::identifier::Identifier;

    /// HTTP client for the record API.
    pub struct FinnaClient {
        http: Arc<HttpFetcher>,
        api_url: String,
    }

    impl FinnaClient {
        pub fn new(http: Arc<HttpFetcher>, api_url: impl Into<String>) -> Self {
            Self {
                http,
                api_url: api_url.into(),
            }
        }
    }

    #[async_trait]
    impl CatalogApi for FinnaClient {
        #[instrument(skip(self), fields(id = %id))]
        async fn fetch_record(&self, id: &Identifier) -> Result<RecordResponse> {
            let url = record_request_url(&self.api_url, id);
            debug!(url = %url, "Fetching catalog record");
            self.http.get_json(&url).await
        }
    }
}
