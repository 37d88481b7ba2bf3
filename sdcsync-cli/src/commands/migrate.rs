//! Migrate command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sdcsync_core::identifier::{migrate_legacy_id, quote_path, resolve_current_id};
use sdcsync_core::{Identifier, SyncConfig};
use tracing::info;

use crate::utils::http_fetcher;

/// Execute the migrate command.
///
/// Ids without a scheme prefix are legacy gallery ids and are rewritten
/// offline. With `--resolve`, an obsolete catalog id is replaced by the one
/// named on its record page.
pub async fn execute(id: String, resolve: bool, quiet: bool) -> Result<()> {
    let config = SyncConfig::from_env();

    let migrated = if id.contains('.') {
        id.clone()
    } else {
        let migrated = migrate_legacy_id(&id);
        if migrated.is_empty() {
            bail!("Verification failed: {id} has no known legacy prefix");
        }
        info!(legacy = %id, migrated = %migrated, "Migrated legacy id");
        quote_path(&migrated)
    };
    let identifier = Identifier::new(&migrated).context("Failed to parse identifier")?;

    let current = if resolve && identifier.is_obsolete() {
        let http = http_fetcher(&config)?;
        let record_url = identifier.record_url(&config.record_base);
        let current = resolve_current_id(http.as_ref(), &record_url)
            .await
            .with_context(|| format!("Failed to fetch record page {record_url}"))?;
        match current {
            Some(current) => Identifier::new(&current).context("Failed to parse scraped id")?,
            None => bail!("Verification failed: no current id on {record_url}"),
        }
    } else {
        identifier.clone()
    };

    if quiet {
        println!("{current}");
        return Ok(());
    }

    println!();
    println!("   {} {}", "Input:".dimmed(), id);
    if migrated != id {
        println!("   {} {}", "Migrated:".dimmed(), identifier);
    }
    if current != identifier {
        println!("   {} {}", "Current:".dimmed(), current.as_str().green().bold());
    } else if current.is_obsolete() {
        println!(
            "   {}",
            "Obsolete scheme, use --resolve to look up the current id".yellow()
        );
    }
    println!(
        "   {} {}",
        "Record page:".dimmed(),
        current.record_url(&config.record_base)
    );
    Ok(())
}
