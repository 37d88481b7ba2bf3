//! Static lookup tables: institution name and collection label to item code.
//!
//! Which item represents which institution is an editorial decision, so the
//! tables are data. A default set is bundled; a replacement can be loaded
//! from a JSON file of the same shape:
//!
//! ```json
//! { "institutions": { "Museovirasto": "Q3029524" },
//!   "collections": { "Historian kuvakokoelma": "Q107388072" } }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::Result;

const BUNDLED_TABLES: &str = include_str!("../data/lookup_tables.json");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    pub institutions: HashMap<String, String>,
    #[serde(default)]
    pub collections: HashMap<String, String>,
}

impl LookupTables {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let tables = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            institutions = tables.institutions.len(),
            collections = tables.collections.len(),
            "Loaded lookup tables"
        );
        Ok(tables)
    }

    /// The tables shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_TABLES)
    }

    /// Bundled tables unless a file is given.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }

    pub fn institution(&self, name: &str) -> Option<&str> {
        self.institutions.get(name).map(String::as_str)
    }

    pub fn collection(&self, label: &str) -> Option<&str> {
        self.collections.get(label).map(String::as_str)
    }
}
