//! Per-page reconciliation.
//!
//! [`Reconciler::reconcile`] takes one file page from identifier extraction
//! to the list of claims to add. Every stage may end processing of the page;
//! the only side effect before that point is fingerprint caching.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{image_candidates, CatalogApi, CatalogFact, CatalogFacts, ImageCandidates};
use crate::claims::rules::{self, ClaimStatus};
use crate::claims::{property, ClaimDescriptor, ExistingClaimSet};
use crate::config::SyncConfig;
use crate::crosswalk::CrosswalkStore;
use crate::error::{Result, SyncError};
use crate::fingerprint::{FingerprintCache, ImageSource};
use crate::identifier::{resolve_current_id, Identifier, PageSource, SourceIdentifiers};
use crate::matcher::{find_matching_candidate, CandidateMatch, MatchDecision};
use crate::tables::LookupTables;
use crate::wikitext;

/// MIME type fragments of files that are never photographs.
pub const UNSUPPORTED_MIME: &[&str] = &["audio", "ogg", "svg", "pdf", "djvu", "video"];

/// One file page as read from the media repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    pub title: String,
    pub wikitext: String,
    #[serde(default)]
    pub mime: Option<String>,
    /// Full-resolution URL of the hosted file.
    pub local_image_url: String,
    /// Last upload time of the hosted file.
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Current structured-data statements of the file.
    #[serde(default)]
    pub statements: ExistingClaimSet,
}

impl PageInput {
    /// Declared MIME type, falling back to the MIME type statement.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime.as_deref().or_else(|| {
            self.statements
                .string_targets(property::MIME_TYPE)
                .into_iter()
                .next()
        })
    }
}

pub fn is_supported_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    !UNSUPPORTED_MIME.iter().any(|kind| mime.contains(kind))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    UnsupportedMime(String),
    NoSourceUrls,
    NoIdentifier(String),
    /// An obsolete id whose record page did not name a current id.
    StaleIdUnresolved(String),
    RecordUnusable(String),
    /// The record has no extended image data to verify against.
    Unverifiable,
    NoImages,
    LocalImageUnreadable(String),
    ImageMismatch { checked: usize, failed: usize },
}

/// Claims to add to one page, plus anything reported but not written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationPlan {
    pub title: String,
    pub id: Identifier,
    pub record_url: String,
    /// The matching catalog image.
    pub matched_image: String,
    pub decision: MatchDecision,
    /// Facts read from the catalog record.
    pub facts: Vec<CatalogFact>,
    pub claims: Vec<ClaimDescriptor>,
    /// Replacement citation when the page cited an obsolete id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_update: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ReconciliationPlan {
    /// New claims as wikibase statement JSON, keyed by property.
    pub fn statements_json(&self) -> Value {
        let mut statements: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for claim in &self.claims {
            statements
                .entry(claim.property.as_str())
                .or_default()
                .push(claim.to_wikibase_json());
        }
        serde_json::json!(statements)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    Skipped { title: String, reason: SkipReason },
    Reconciled(ReconciliationPlan),
}

impl PageOutcome {
    fn skipped(page: &PageInput, reason: SkipReason) -> Self {
        info!(title = %page.title, reason = ?reason, "Skipping page");
        Self::Skipped {
            title: page.title.clone(),
            reason,
        }
    }

    pub fn plan(&self) -> Option<&ReconciliationPlan> {
        match self {
            Self::Reconciled(plan) => Some(plan),
            Self::Skipped { .. } => None,
        }
    }
}

/// Reconciles file pages against the catalog.
pub struct Reconciler<C, S, P> {
    catalog: C,
    cache: FingerprintCache<S>,
    pages: P,
    tables: LookupTables,
    config: SyncConfig,
    crosswalk: Option<Mutex<CrosswalkStore>>,
}

impl<C, S, P> Reconciler<C, S, P>
where
    C: CatalogApi,
    S: ImageSource,
    P: PageSource,
{
    pub fn new(
        catalog: C,
        cache: FingerprintCache<S>,
        pages: P,
        tables: LookupTables,
        config: SyncConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            pages,
            tables,
            config,
            crosswalk: None,
        }
    }

    /// Use the crosswalk to recover gallery object ids from accession
    /// numbers.
    pub fn with_crosswalk(mut self, crosswalk: CrosswalkStore) -> Self {
        self.crosswalk = Some(Mutex::new(crosswalk));
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn cache(&self) -> &FingerprintCache<S> {
        &self.cache
    }

    #[instrument(skip(self, page), fields(title = %page.title))]
    pub async fn reconcile(&self, page: &PageInput) -> Result<PageOutcome> {
        if let Some(mime) = page.mime_type() {
            if !is_supported_mime(mime) {
                return Ok(PageOutcome::skipped(
                    page,
                    SkipReason::UnsupportedMime(mime.to_string()),
                ));
            }
        } else {
            debug!("No MIME type known, continuing");
        }

        let mut urls = wikitext::source_urls_from_page(&page.wikitext);
        if urls.is_empty() {
            urls = wikitext::reference_urls_from_page(&page.wikitext);
        }
        if urls.is_empty() {
            return Ok(PageOutcome::skipped(page, SkipReason::NoSourceUrls));
        }

        let source_ids = SourceIdentifiers::from_urls(&urls);
        let cited = match source_ids.resolve_identifier() {
            Ok(id) => id,
            Err(SyncError::ParseFailure(msg)) => {
                return Ok(PageOutcome::skipped(page, SkipReason::NoIdentifier(msg)));
            }
            Err(err) => return Err(err),
        };

        let (id, source_update) = if cited.is_obsolete() {
            let cited_url = cited.record_url(&self.config.record_base);
            match resolve_current_id(&self.pages, &cited_url).await? {
                Some(current) => {
                    let current = Identifier::new(&current)?;
                    info!(old = %cited, new = %current, "Obsolete id replaced");
                    let update = wikitext::new_source_text(&self.config.record_base, current.as_str());
                    (current, Some(update))
                }
                None => {
                    return Ok(PageOutcome::skipped(
                        page,
                        SkipReason::StaleIdUnresolved(cited.to_string()),
                    ));
                }
            }
        } else {
            (cited, None)
        };

        let response = self.catalog.fetch_record(&id).await?;
        let Some(record) = response.record() else {
            return Ok(PageOutcome::skipped(
                page,
                SkipReason::RecordUnusable(id.to_string()),
            ));
        };
        if record.id != id.as_str() {
            debug!(requested = %id, returned = %record.id, "Record id differs from request");
        }

        let candidates = match image_candidates(record, &self.config.image_base) {
            ImageCandidates::Urls(urls) => urls,
            ImageCandidates::Unverifiable => {
                return Ok(PageOutcome::skipped(page, SkipReason::Unverifiable));
            }
            ImageCandidates::NoImages => {
                return Ok(PageOutcome::skipped(page, SkipReason::NoImages));
            }
        };
        let record_url = id.record_url(&self.config.record_base);
        let facts =
            CatalogFacts::from_record(record, &self.tables).with_operator_for(&record_url);

        let local = match self
            .cache
            .get_or_refresh(&page.local_image_url, page.last_modified)
            .await
        {
            Ok(fingerprint) => fingerprint,
            Err(SyncError::PerceptualHashError(msg)) => {
                return Ok(PageOutcome::skipped(page, SkipReason::LocalImageUnreadable(msg)));
            }
            Err(err) => return Err(err),
        };

        // Catalog images carry no modification time, so their fingerprints
        // are never refreshed.
        let (matched_image, decision) =
            match find_matching_candidate(&self.cache, &local, &candidates, None).await? {
                CandidateMatch::Matched { url, decision, .. } => (url, decision),
                CandidateMatch::NoCandidates => {
                    return Ok(PageOutcome::skipped(page, SkipReason::NoImages));
                }
                CandidateMatch::NoMatch { checked, failed } => {
                    return Ok(PageOutcome::skipped(
                        page,
                        SkipReason::ImageMismatch { checked, failed },
                    ));
                }
            };

        let object_id = self.gallery_object_id(&source_ids).await?;
        let mut planner = ClaimPlanner::new(&page.statements, &record_url);
        planner.plan(page.mime_type(), &facts, &id, object_id.as_deref());
        let (claims, notes) = planner.finish();

        info!(
            id = %id,
            claims = claims.len(),
            notes = notes.len(),
            "Page reconciled"
        );
        Ok(PageOutcome::Reconciled(ReconciliationPlan {
            title: page.title.clone(),
            id,
            record_url,
            matched_image,
            decision,
            facts: facts.facts(),
            claims,
            source_update,
            notes,
        }))
    }

    async fn gallery_object_id(&self, ids: &SourceIdentifiers) -> Result<Option<String>> {
        if let Some(object_id) = &ids.gallery_object_id {
            return Ok(Some(object_id.clone()));
        }
        let (Some(accession), Some(crosswalk)) = (&ids.accession_number, &self.crosswalk) else {
            return Ok(None);
        };
        let found = crosswalk.lock().await.find_by_accession(accession)?;
        if found.is_none() {
            debug!(accession = %accession, "Accession number not in crosswalk");
        }
        Ok(found)
    }
}

/// Applies the claim rules in output order.
struct ClaimPlanner<'a> {
    existing: &'a ExistingClaimSet,
    record_url: &'a str,
    claims: Vec<ClaimDescriptor>,
    notes: Vec<String>,
}

impl<'a> ClaimPlanner<'a> {
    fn new(existing: &'a ExistingClaimSet, record_url: &'a str) -> Self {
        Self {
            existing,
            record_url,
            claims: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn plan(
        &mut self,
        mime: Option<&str>,
        facts: &CatalogFacts,
        id: &Identifier,
        object_id: Option<&str>,
    ) {
        let record_url = self.record_url;

        // A file without any statements has no structured-data entity yet;
        // the MIME type claim creates it.
        if self.existing.is_empty() {
            match mime {
                Some(mime) => self.claims.push(rules::build_mime_type_claim(mime)),
                None => debug!("No statements and no MIME type"),
            }
        }

        if let Some(operator) = &facts.operator {
            let publisher = facts.publisher.as_deref();
            match rules::source_of_file_status(self.existing, record_url, operator, publisher) {
                ClaimStatus::Absent => self.claims.push(rules::build_source_of_file_claim(
                    record_url, operator, publisher,
                )),
                ClaimStatus::PresentButIncomplete => {
                    self.note("source of file lacks the publisher qualifier")
                }
                ClaimStatus::Present => {}
            }
        }

        match &facts.license {
            Some(license) => {
                let status = rules::license_status(self.existing, license, record_url);
                self.apply(status, "license", || {
                    rules::build_license_claim(license, record_url)
                });
            }
            None => self.note("record has no license"),
        }

        if let (Some(license), Some(status)) = (&facts.license, &facts.copyright_status) {
            let current = rules::copyright_status_status(self.existing, license, status);
            self.apply(current, "copyright status", || {
                rules::build_copyright_status_claim(license, status, record_url)
            });
        }

        if let Some(date) = &facts.inception {
            if rules::inception_status(self.existing, date).is_absent() {
                self.claims
                    .push(rules::build_inception_claim(date, record_url));
            }
        }

        for code in rules::missing_collections(self.existing, &facts.collections) {
            self.claims.push(rules::build_collection_claim(&code));
        }

        if rules::catalog_id_status(self.existing, id.as_str()).is_absent() {
            self.claims.push(rules::build_catalog_id_claim(id.as_str()));
        }

        if let Some(object_id) = object_id {
            if rules::gallery_artwork_status(self.existing, object_id).is_absent() {
                self.claims
                    .push(rules::build_gallery_artwork_claim(object_id));
            }
        }
    }

    fn apply(
        &mut self,
        status: Result<ClaimStatus>,
        what: &str,
        build: impl FnOnce() -> Result<ClaimDescriptor>,
    ) {
        match status {
            Ok(ClaimStatus::Absent) => match build() {
                Ok(claim) => self.claims.push(claim),
                Err(err) => self.note(&err.to_string()),
            },
            Ok(ClaimStatus::PresentButIncomplete) => {
                self.note(&format!("{what} present without reference to the record"))
            }
            Ok(ClaimStatus::Present) => {}
            Err(err) => self.note(&err.to_string()),
        }
    }

    fn note(&mut self, note: &str) {
        warn!(note, "Not written");
        self.notes.push(note.to_string());
    }

    fn finish(self) -> (Vec<ClaimDescriptor>, Vec<String>) {
        (self.claims, self.notes)
    }
}
