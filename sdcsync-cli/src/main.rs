//! sdcsync CLI - reconcile Commons file pages with Finna catalog records.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "sdcsync")]
#[command(author, version, about = "Reconcile Commons structured data with Finna catalog records", long_about = None)]
#[command(after_help = exit_codes::HELP)]
struct Cli {
    /// Only print machine-readable results
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract catalog identifiers from a source field or whole page text
    Extract {
        /// Source text, a file containing it, or - for stdin
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a legacy gallery id or obsolete record id to a current id
    Migrate {
        /// Legacy gallery id (e.g. HK7155_219-65-1) or catalog id
        #[arg(value_name = "ID")]
        id: String,

        /// Scrape the current id from the catalog record page
        #[arg(long)]
        resolve: bool,
    },

    /// Show the cached perceptual fingerprint of an image
    Fingerprint {
        /// Image URL or local path
        #[arg(value_name = "IMAGE")]
        image: String,

        /// Refresh the cached fingerprint if it is older than this (RFC 3339)
        #[arg(long, value_name = "TIME")]
        last_modified: Option<DateTime<Utc>>,

        #[command(flatten)]
        cache: CacheArgs,

        /// Print the fingerprint as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decide whether two images show the same photograph
    Compare {
        /// First image URL or local path
        #[arg(value_name = "IMAGE_A")]
        a: String,

        /// Second image URL or local path
        #[arg(value_name = "IMAGE_B")]
        b: String,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Plan the claims to add to one file page
    Reconcile {
        /// Page JSON (title, wikitext, local_image_url, statements), or - for stdin
        #[arg(value_name = "PAGE")]
        page: String,

        #[command(flatten)]
        cache: CacheArgs,

        /// Accession number crosswalk database
        #[arg(long, value_name = "DB")]
        crosswalk: Option<PathBuf>,

        /// Print only the new statements in repository JSON form
        #[arg(long)]
        statements: bool,
    },

    /// Manage the accession number crosswalk
    Crosswalk {
        #[command(subcommand)]
        action: CrosswalkAction,
    },
}

#[derive(Args)]
struct CacheArgs {
    /// Fingerprint cache database (defaults to FINGERPRINT_DB)
    #[arg(long, value_name = "DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CrosswalkAction {
    /// Remember an object id for an accession number
    Add {
        #[arg(value_name = "OBJECT_ID")]
        object_id: String,

        #[arg(value_name = "ACCESSION")]
        accession: String,

        /// Crosswalk database (defaults to CROSSWALK_DB)
        #[arg(long, value_name = "DB")]
        db: Option<PathBuf>,
    },

    /// Look up an entry by accession number or object id
    Lookup {
        #[arg(long, conflicts_with = "object_id", required_unless_present = "object_id")]
        accession: Option<String>,

        #[arg(long)]
        object_id: Option<String>,

        /// Crosswalk database (defaults to CROSSWALK_DB)
        #[arg(long, value_name = "DB")]
        db: Option<PathBuf>,
    },
}

fn init_tracing(quiet: bool) {
    let default = if quiet {
        "sdcsync=warn,sdcsync_core=warn"
    } else {
        "sdcsync=info,sdcsync_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Extract { source, json } => commands::extract::execute(source, json, quiet),
        Commands::Migrate { id, resolve } => commands::migrate::execute(id, resolve, quiet).await,
        Commands::Fingerprint {
            image,
            last_modified,
            cache,
            json,
        } => commands::fingerprint::execute(image, last_modified, cache.db, json, quiet).await,
        Commands::Compare { a, b, cache } => commands::compare::execute(a, b, cache.db, quiet).await,
        Commands::Reconcile {
            page,
            cache,
            crosswalk,
            statements,
        } => commands::reconcile::execute(page, cache.db, crosswalk, statements, quiet).await,
        Commands::Crosswalk { action } => match action {
            CrosswalkAction::Add {
                object_id,
                accession,
                db,
            } => commands::crosswalk::execute_add(object_id, accession, db, quiet),
            CrosswalkAction::Lookup {
                accession,
                object_id,
                db,
            } => commands::crosswalk::execute_lookup(accession, object_id, db, quiet),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
