//! Compare command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sdcsync_core::matcher::compare;
use sdcsync_core::SyncConfig;
use tracing::info;

use crate::utils::{http_fetcher, open_cache, FileOrHttpSource};

/// Execute the compare command.
///
/// Exits with the verification code when the images differ.
pub async fn execute(a: String, b: String, db: Option<PathBuf>, quiet: bool) -> Result<()> {
    let config = SyncConfig::from_env();
    let source = FileOrHttpSource::new(http_fetcher(&config)?);
    let cache = open_cache(&config, db.as_deref(), source)?;

    let first = cache
        .get_or_refresh(&a, None)
        .await
        .with_context(|| format!("Failed to fingerprint {a}"))?;
    let second = cache
        .get_or_refresh(&b, None)
        .await
        .with_context(|| format!("Failed to fingerprint {b}"))?;

    let decision = compare(&first, &second);
    info!(
        same = decision.same,
        phash_distance = ?decision.phash_distance,
        dhash_distance = ?decision.dhash_distance,
        "Compared images"
    );

    let distance = |d: Option<u32>| d.map_or_else(|| "n/a".to_string(), |d| d.to_string());
    if quiet {
        println!(
            "{} {} {}",
            decision.same,
            distance(decision.phash_distance),
            distance(decision.dhash_distance)
        );
    } else {
        println!();
        if decision.same {
            println!("{}", "SAME PHOTOGRAPH".green().bold());
        } else {
            println!("{}", "DIFFERENT".red().bold());
        }
        println!();
        println!("   {} {}", "phash distance:".dimmed(), distance(decision.phash_distance));
        println!("   {} {}", "dhash distance:".dimmed(), distance(decision.dhash_distance));
    }

    if !decision.same {
        bail!("Verification failed: images do not match");
    }
    Ok(())
}
