//! Reconcile command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sdcsync_core::{
    CatalogFact, CrosswalkStore, FinnaClient, LookupTables, PageInput, PageOutcome, Reconciler,
    SyncConfig,
};
use tracing::info;

use crate::utils::{http_fetcher, open_cache, read_text_arg};

/// Execute the reconcile command.
///
/// The outcome is printed to stdout as JSON; the human summary goes to
/// stderr so the output can be piped.
pub async fn execute(
    page: String,
    db: Option<PathBuf>,
    crosswalk: Option<PathBuf>,
    statements_only: bool,
    quiet: bool,
) -> Result<()> {
    if page != "-" && !std::path::Path::new(&page).is_file() {
        anyhow::bail!("Failed to read page file: {page}");
    }
    let text = read_text_arg(&page)?;
    let input: PageInput = serde_json::from_str(&text).context("Failed to parse page JSON")?;

    let config = SyncConfig::from_env();
    let tables = LookupTables::load_or_bundled(config.lookup_tables.as_deref())
        .context("Failed to load lookup tables")?;
    let http = http_fetcher(&config)?;
    let catalog = FinnaClient::new(http.clone(), config.api_url.clone());
    let cache = open_cache(&config, db.as_deref(), http.clone())?;

    let crosswalk_path = crosswalk.or_else(|| {
        let configured = config.crosswalk_db.clone();
        configured.is_file().then_some(configured)
    });

    let mut reconciler = Reconciler::new(catalog, cache, http, tables, config);
    if let Some(path) = crosswalk_path {
        let store = CrosswalkStore::open(&path)
            .with_context(|| format!("Failed to open crosswalk database: {}", path.display()))?;
        reconciler = reconciler.with_crosswalk(store);
    }

    let outcome = reconciler
        .reconcile(&input)
        .await
        .with_context(|| format!("Failed to reconcile {}", input.title))?;

    let output = match (&outcome, statements_only) {
        (PageOutcome::Reconciled(plan), true) => plan.statements_json(),
        _ => serde_json::to_value(&outcome).context("Failed to serialize outcome")?,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize outcome")?
    );

    match &outcome {
        PageOutcome::Reconciled(plan) => {
            info!(id = %plan.id, claims = plan.claims.len(), "Reconciled");
            if !quiet {
                eprintln!();
                eprintln!("{} {}", "Reconciled".green().bold(), plan.title);
                eprintln!("   {} {}", "Record:".dimmed(), plan.record_url);
                eprintln!("   {} {}", "Matched image:".dimmed(), plan.matched_image);
                let facts: Vec<_> = plan.facts.iter().map(CatalogFact::property).collect();
                eprintln!("   {} {}", "Record facts:".dimmed(), facts.join(", "));
                eprintln!("   {} {}", "New claims:".dimmed(), plan.claims.len());
                for claim in &plan.claims {
                    eprintln!("     - {}", claim.property);
                }
                for note in &plan.notes {
                    eprintln!("   {} {}", "Note:".yellow(), note);
                }
            }
        }
        PageOutcome::Skipped { title, reason } => {
            if !quiet {
                eprintln!();
                eprintln!("{} {} ({:?})", "Skipped".yellow().bold(), title, reason);
            }
        }
    }
    Ok(())
}
