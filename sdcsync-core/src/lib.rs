//! sdcsync core - catalog reconciliation for media repository files
//!
//! This crate links files hosted on a media repository to their records in
//! the Finna catalog and derives the structured-data claims the files are
//! missing.
//!
//! # Pipeline
//!
//! - Identifiers are extracted from the file page's source citation, and
//!   obsolete schemes are migrated to current catalog ids.
//! - The catalog record is fetched and its images are compared with the
//!   hosted file through perceptual fingerprints, cached on disk.
//! - Once an image matches, catalog facts (license, collections, inception,
//!   publisher) are compared with the file's existing claims.
//!
//! # Features
//!
//! - `network` (default): HTTP clients for the catalog, images and record
//!   pages. Parsing, matching and claim rules work without it.
//!
//! # Example
//!
//! ```
//! use sdcsync_core::{SourceIdentifiers, matcher::is_match};
//!
//! let ids = SourceIdentifiers::from_source(
//!     "[https://www.finna.fi/Record/museovirasto.0D5A1A9C Finna]",
//! );
//! let id = ids.resolve_identifier().unwrap();
//! assert_eq!(id.as_str(), "museovirasto.0D5A1A9C");
//!
//! assert!(is_match(2, 2));
//! assert!(!is_match(5, 5));
//! ```

pub mod catalog;
pub mod claims;
pub mod config;
pub mod crosswalk;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "network")]
pub mod http;
pub mod identifier;
pub mod matcher;
pub mod pipeline;
pub mod tables;
pub mod wikitext;

// Re-export main types for convenience
pub use catalog::{CatalogApi, CatalogFact, CatalogFacts, CatalogRecord, PartialDate, RecordResponse};
pub use claims::{ClaimDescriptor, ClaimStatus, ClaimValue, ExistingClaimSet};
pub use config::SyncConfig;
pub use crosswalk::CrosswalkStore;
pub use error::{Result, SyncError, MIN_IMAGE_BYTES};
pub use fingerprint::{
    FingerprintCache, FingerprintHasher, FingerprintStore, HashValue, ImageSource,
    PerceptualFingerprint,
};
pub use identifier::{Identifier, IdScheme, PageSource, SourceIdentifiers};
pub use matcher::{same_image, CandidateMatch, MatchDecision};
pub use pipeline::{PageInput, PageOutcome, Reconciler, ReconciliationPlan, SkipReason};
pub use tables::LookupTables;

#[cfg(feature = "network")]
pub use catalog::FinnaClient;
#[cfg(feature = "network")]
pub use http::{HttpConfig, HttpFetcher};
