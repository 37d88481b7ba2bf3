//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use sdcsync_core::SyncConfig;
use tracing::info;

use crate::utils::{format_timestamp, http_fetcher, open_cache, FileOrHttpSource};

/// Execute the fingerprint command.
pub async fn execute(
    image: String,
    last_modified: Option<DateTime<Utc>>,
    db: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let config = SyncConfig::from_env();
    let source = FileOrHttpSource::new(http_fetcher(&config)?);
    let cache = open_cache(&config, db.as_deref(), source)?;

    let fingerprint = cache
        .get_or_refresh(&image, last_modified)
        .await
        .with_context(|| format!("Failed to fingerprint {image}"))?;

    info!(
        image = %image,
        phash = %fingerprint.phash.to_hex(),
        dhash = %fingerprint.dhash.to_hex(),
        "Fingerprint ready"
    );

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&fingerprint).context("Failed to serialize fingerprint")?
        );
        return Ok(());
    }

    if quiet {
        println!("{} {}", fingerprint.phash.to_hex(), fingerprint.dhash.to_hex());
        return Ok(());
    }

    println!();
    println!("{}", "Perceptual fingerprint".cyan().bold());
    println!();
    println!("   {} {}", "Image:".dimmed(), fingerprint.url);
    println!(
        "   {} {} ({}x{})",
        "phash:".dimmed(),
        fingerprint.phash.to_hex(),
        fingerprint.phash.width,
        fingerprint.phash.width
    );
    println!(
        "   {} {} ({}x{})",
        "dhash:".dimmed(),
        fingerprint.dhash.to_hex(),
        fingerprint.dhash.width,
        fingerprint.dhash.width
    );
    println!(
        "   {} {}",
        "Taken:".dimmed(),
        format_timestamp(&fingerprint.timestamp)
    );
    if !fingerprint.is_valid() {
        println!(
            "   {}",
            "Zero hash: this fingerprint never matches anything".yellow()
        );
    }
    Ok(())
}
