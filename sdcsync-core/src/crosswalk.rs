//! Accession number crosswalk.
//!
//! The national gallery cites artworks either by accession number
//! (`fng.fi/...?si=A-1995-96`) or by object id
//! (`kansallisgalleria.fi/fi/object/624337`). Only the object id is a valid
//! claim value, so resolved pairs are remembered here.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::error::Result;

pub struct CrosswalkStore {
    conn: Connection,
}

impl CrosswalkStore {
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.initialize_schema()?;
        debug!(path = %path.display(), "Opened crosswalk cache");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fngcache (
                objectid TEXT NOT NULL,
                invnum TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Object id for an accession number. Ambiguous entries count as missing.
    pub fn find_by_accession(&self, accession_number: &str) -> Result<Option<String>> {
        let rows = self.select("SELECT objectid FROM fngcache WHERE invnum = ?1", accession_number)?;
        Ok(single(rows, accession_number))
    }

    /// Accession number for an object id. Ambiguous entries count as missing.
    pub fn find_by_object_id(&self, object_id: &str) -> Result<Option<String>> {
        let rows = self.select("SELECT invnum FROM fngcache WHERE objectid = ?1", object_id)?;
        Ok(single(rows, object_id))
    }

    /// Remember a pair. Inserting a known pair again changes nothing.
    pub fn insert(&self, object_id: &str, accession_number: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO fngcache (objectid, invnum)
             SELECT ?1, ?2
             WHERE NOT EXISTS (SELECT 1 FROM fngcache WHERE objectid = ?1 AND invnum = ?2)",
            params![object_id, accession_number],
        )?;
        if inserted > 0 {
            debug!(object_id, accession_number, "Added crosswalk entry");
        }
        Ok(inserted > 0)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fngcache", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn select(&self, sql: &str, key: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn single(mut rows: Vec<String>, key: &str) -> Option<String> {
    match rows.len() {
        0 => None,
        1 => rows.pop(),
        n => {
            warn!(key, matches = n, "Ambiguous crosswalk entry, ignoring");
            None
        }
    }
}
