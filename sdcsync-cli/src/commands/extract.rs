//! Extract command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use sdcsync_core::identifier::urls_from_source;
use sdcsync_core::{wikitext, SourceIdentifiers};
use serde::Serialize;
use tracing::info;

use crate::utils::read_text_arg;

#[derive(Serialize)]
struct ExtractReport<'a> {
    urls: &'a [String],
    ids: &'a SourceIdentifiers,
    resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the extract command.
///
/// Page text (anything with a template) is searched for the Source field
/// first; plain text is scanned for URLs directly.
pub fn execute(source: String, json: bool, quiet: bool) -> Result<()> {
    let text = read_text_arg(&source)?;

    let urls = if text.contains("{{") {
        let mut urls = wikitext::source_urls_from_page(&text);
        if urls.is_empty() {
            urls = wikitext::reference_urls_from_page(&text);
        }
        urls
    } else {
        urls_from_source(&text)
    };

    let ids = SourceIdentifiers::from_urls(&urls);
    let resolved = ids.resolve_identifier();
    info!(urls = urls.len(), resolved = resolved.is_ok(), "Extracted identifiers");

    if json {
        let report = ExtractReport {
            urls: &urls,
            ids: &ids,
            resolved: resolved.as_ref().ok().map(ToString::to_string),
            error: resolved.as_ref().err().map(ToString::to_string),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else if !quiet {
        println!();
        println!("{}", "Source URLs".cyan().bold());
        if urls.is_empty() {
            println!("   {}", "(none)".dimmed());
        }
        for url in &urls {
            println!("   {url}");
        }
        println!();
        print_id("Record id:", &ids.record_id);
        print_id("Query id:", &ids.query_id);
        print_id("Legacy gallery id:", &ids.legacy_gallery_id);
        print_id("Accession number:", &ids.accession_number);
        print_id("Gallery object id:", &ids.gallery_object_id);
        println!();
        if let Ok(id) = &resolved {
            println!("   {} {}", "Resolved:".dimmed(), id.as_str().green().bold());
            if id.is_obsolete() {
                println!(
                    "   {}",
                    "Obsolete scheme, run 'sdcsync migrate --resolve' for the current id".yellow()
                );
            }
        }
    } else if let Ok(id) = &resolved {
        println!("{id}");
    }

    resolved.context("Failed to resolve an identifier")?;
    Ok(())
}

fn print_id(label: &str, value: &Option<String>) {
    if let Some(value) = value {
        println!("   {} {}", label.dimmed(), value);
    }
}
