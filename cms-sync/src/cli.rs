///
/// This module implements the full CLI interface for cms-sync: command parsing,
/// option mapping and the async entrypoint.
///
/// All pipeline logic (schema, fetching, documents, associations, writing) lives in
/// the [`cms-sync-core`] crate. This module is strictly CLI glue.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands.
/// - Subcommand routing (`sync`) and mapping of flags onto [`SyncOptions`].
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
///
/// ## How To Use
/// - For command-line users: run the `cms-sync` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`cms-sync-core`]: ../../cms-sync-core/
use crate::contentful::ContentfulClient;
use crate::load_config::{expand_env, load_config};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cms_sync_core::config::SyncOptions;
use cms_sync_core::synchronise::synchronise;
use cms_sync_core::writer::Writer;
use std::path::PathBuf;

/// CLI for cms-sync: import headless CMS content into static-site collections.
#[derive(Parser, Debug)]
#[clap(
    name = "cms-sync",
    version,
    about = "Import Contentful entries as front-matter documents into static-site collections"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every configured collection and write its documents
    Sync(SyncArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SyncArgs {
    /// Path to the site's YAML config file
    #[clap(long, default_value = "_config.yml")]
    pub config: PathBuf,

    /// Only sync these collections, e.g. "--collections articles,authors"
    #[clap(short = 'c', long, value_delimiter = ',')]
    pub collections: Vec<String>,

    /// Limit the number of entries per collection, e.g. "--limit 10"
    #[clap(short = 'n', long)]
    pub limit: Option<usize>,

    /// Only entries created since, e.g. "--recent 1.day.ago"
    #[clap(short = 'd', long)]
    pub recent: Option<String>,

    /// Extra query parameters for every request, e.g. "--query fields.title=Hello"
    #[clap(short = 'q', long)]
    pub query: Option<String>,

    /// Remove existing collection files before importing
    #[clap(short = 'f', long = "force")]
    pub force: bool,

    /// Only entries distributed to these sites
    #[clap(short = 's', long, value_delimiter = ',')]
    pub sites: Vec<String>,
}

impl SyncArgs {
    pub fn sync_options(&self) -> SyncOptions {
        let trimmed = |values: &[String]| {
            values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
        };
        SyncOptions {
            collections: trimmed(&self.collections),
            limit: self.limit,
            order: None,
            recent: self.recent.clone(),
            query: self.query.as_deref().map(expand_env),
            clean: self.force,
            sites: trimmed(&self.sites),
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync(args) => {
            let config = load_config(&args.config)?;
            let options = args.sync_options();
            options.trace_loaded();
            tracing::info!(command = "sync", site_root = ?config.site_root, "Starting synchronisation process");

            let client = ContentfulClient::new_from_env()
                .map_err(|e| anyhow::anyhow!("Failed to construct Contentful client from env: {e}"))?;
            let writer = Writer::new(&config.site_root);

            match synchronise(&config.site, &options, &client, &writer).await {
                Ok(report) => {
                    tracing::info!(
                        command = "sync",
                        written = report.written(),
                        skipped = report.skipped(),
                        failed = report.failed(),
                        "Synchronisation complete"
                    );
                    for collection in &report.collections {
                        println!(
                            "{}: {} written, {} skipped, {} failed",
                            collection.collection, collection.written, collection.skipped, collection.failed
                        );
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}
