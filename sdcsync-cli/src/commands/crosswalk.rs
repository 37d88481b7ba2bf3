//! Crosswalk command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sdcsync_core::{CrosswalkStore, SyncConfig};

fn open(db: Option<PathBuf>) -> Result<CrosswalkStore> {
    let path = db.unwrap_or_else(|| SyncConfig::from_env().crosswalk_db);
    CrosswalkStore::open(&path)
        .with_context(|| format!("Failed to open crosswalk database: {}", path.display()))
}

/// Execute the crosswalk add command.
pub fn execute_add(
    object_id: String,
    accession: String,
    db: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let store = open(db)?;
    let inserted = store
        .insert(&object_id, &accession)
        .context("Failed to write crosswalk entry")?;

    if !quiet {
        if inserted {
            println!("{} {} = {}", "Added".green().bold(), accession, object_id);
        } else {
            println!("{} {} = {}", "Already known".dimmed(), accession, object_id);
        }
    }
    Ok(())
}

/// Execute the crosswalk lookup command.
pub fn execute_lookup(
    accession: Option<String>,
    object_id: Option<String>,
    db: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let store = open(db)?;

    let (key, found) = match (accession, object_id) {
        (Some(accession), _) => {
            let found = store.find_by_accession(&accession)?;
            (accession, found)
        }
        (None, Some(object_id)) => {
            let found = store.find_by_object_id(&object_id)?;
            (object_id, found)
        }
        (None, None) => bail!("Either --accession or --object-id is required"),
    };

    match found {
        Some(value) if quiet => println!("{value}"),
        Some(value) => println!("   {} {}", format!("{key}:").dimmed(), value.green()),
        None => bail!("No unique crosswalk entry for {key}"),
    }
    Ok(())
}
