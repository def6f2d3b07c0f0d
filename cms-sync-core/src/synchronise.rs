//! High-level pipeline: orchestrates schema → fetch → build → associate → write.
//!
//! This module drives one full resync of every configured collection. It:
//!   - Resolves the content models into a [`ResolvedSchema`]
//!   - Fetches every selected content type, concurrently across types
//!   - Builds [`Document`]s against a per-run [`EntryCache`]
//!   - Runs the association pass once every type is built
//!   - Writes each document and returns a per-collection [`SyncReport`]
//!
//! # Responsibilities
//! - Fail fast on model or fetch errors: a partially fetched corpus would
//!   corrupt belongs-to lookups, so nothing is built or written
//! - Record filesystem errors per document without aborting the batch
//! - Never touch the site configuration; all inputs are in memory
//!
//! # Callable From
//! - The CLI crate and integration tests, with any [`ContentSource`]
//!   (a real HTTP client or `MockContentSource`)
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting types: [`SyncReport`], [`CollectionReport`]

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::associations::AssociationPass;
use crate::cache::EntryCache;
use crate::config::{AssociationDefinition, CollectionConfig, SiteConfig, SyncOptions};
use crate::contract::{ContentSource, RawEntry};
use crate::document::{Document, DocumentBuilder};
use crate::error::SyncError;
use crate::fetch::{filter_channels, on_channels, EntryFetcher, EntryQuery, FetchedEntries};
use crate::schema::{resolve_schema, ExcludeList, ResolvedSchema, SchemaWarning};
use crate::writer::Writer;

/// Outcome of one sync run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub collections: Vec<CollectionReport>,
    pub warnings: Vec<SchemaWarning>,
}

impl SyncReport {
    pub fn written(&self) -> usize {
        self.collections.iter().map(|c| c.written).sum()
    }

    pub fn skipped(&self) -> usize {
        self.collections.iter().map(|c| c.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.collections.iter().map(|c| c.failed).sum()
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == name)
    }
}

/// Per-collection counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub content_type: String,
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A configured collection selected for this run.
struct Selected<'a> {
    key: &'a str,
    type_id: &'a str,
    config: &'a CollectionConfig,
}

pub async fn synchronise<S>(
    site: &SiteConfig,
    options: &SyncOptions,
    source: &S,
    writer: &Writer,
) -> Result<SyncReport, SyncError>
where
    S: ContentSource + ?Sized,
{
    info!("[SYNC] Starting content synchronisation");

    // Step 1: schema.
    let models = source.content_type_models().await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Failed to load content type models");
        SyncError::Models(e)
    })?;
    let schema = resolve_schema(&models, &ExcludeList::from_site(site));
    info!(
        models = models.len(),
        types = schema.types.len(),
        warnings = schema.warnings.len(),
        "[SYNC] Resolved schema"
    );

    let selected: Vec<Selected<'_>> = site
        .content_types
        .iter()
        .map(|(key, config)| Selected {
            key: key.as_str(),
            type_id: config.type_id(key),
            config,
        })
        .filter(|s| options.includes_collection(s.key, s.type_id))
        .fold(Vec::<Selected>::new(), |mut selected, s| {
            let earlier = selected.iter().find(|kept| kept.type_id == s.type_id).map(|kept| kept.key);
            match earlier {
                Some(earlier) => warn!(
                    collection = s.key,
                    content_type = s.type_id,
                    written_by = earlier,
                    "[SYNC] Content type already selected by an earlier collection; skipping"
                ),
                None => selected.push(s),
            }
            selected
        });
    if selected.is_empty() {
        warn!(requested = ?options.collections, "[SYNC] No configured collection selected");
    }
    for s in &selected {
        if !schema.contains(s.type_id) {
            warn!(
                collection = s.key,
                content_type = s.type_id,
                "[SYNC] Content type missing from schema; field kinds will be inferred"
            );
        }
    }

    // Step 2: optional clean.
    if options.clean {
        for s in &selected {
            writer.remove_collection(s.type_id)?;
        }
    }

    // Step 3: fetch every type; pages within a type stay sequential.
    let fetcher = EntryFetcher::new(source);
    let fetcher = &fetcher;
    let now = writer.now();
    let fetches = selected.iter().map(|s| {
        let query = EntryQuery::assemble(options, s.config, now);
        debug!(content_type = s.type_id, ?query, "[SYNC] Assembled query");
        async move { fetcher.fetch_all(s.type_id, &query).await }
    });
    let fetched: Vec<FetchedEntries> = try_join_all(fetches).await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Fetch failed; aborting run");
        e
    })?;

    // Step 4: cache. Page items go in before includes.
    let mut cache = EntryCache::new();
    for f in &fetched {
        cache.extend_entries(f.entries.iter().cloned());
    }
    let mut per_collection = Vec::with_capacity(fetched.len());
    for f in fetched {
        cache.extend_includes(f.includes);
        per_collection.push(f.entries);
    }
    info!(
        entries = cache.entry_count(),
        assets = cache.asset_count(),
        "[SYNC] Populated entry cache"
    );

    // Step 5: channel filter. Entries outside the requested sites are neither
    // written nor reachable through links.
    let fetched_counts: Vec<usize> = per_collection.iter().map(Vec::len).collect();
    let channel_field = site.config.channel_field();
    let per_collection: Vec<Vec<RawEntry>> = selected
        .iter()
        .zip(per_collection)
        .map(|(s, entries)| filter_channels(entries, schema.get(s.type_id), channel_field, &options.sites))
        .collect();
    let evicted = cache.retain_entries(|entry| {
        on_channels(entry, schema.get(entry.content_type_id()), channel_field, &options.sites)
    });
    if evicted > 0 {
        info!(evicted, sites = ?options.sites, "[SYNC] Evicted entries outside the requested sites");
    }

    // Step 6: build.
    let mut documents = build_documents(&schema, &cache, &selected, per_collection);

    // Step 7: associations, only once every type is built.
    let definitions: IndexMap<String, AssociationDefinition> = selected
        .iter()
        .map(|s| (s.type_id.to_string(), s.config.associations()))
        .filter(|(_, definition)| !definition.is_empty())
        .collect();
    let pass = site
        .content_types
        .iter()
        .fold(AssociationPass::new(&definitions), |pass, (key, config)| {
            pass.with_alias(key.as_str(), config.type_id(key))
        });
    pass.apply(&mut documents);

    // Step 8: write.
    let mut report = SyncReport {
        collections: Vec::with_capacity(selected.len()),
        warnings: schema.warnings.clone(),
    };
    for (s, fetched) in selected.iter().zip(fetched_counts) {
        let docs = documents.shift_remove(s.type_id).unwrap_or_default();
        let mut collection = CollectionReport {
            collection: s.key.to_string(),
            content_type: s.type_id.to_string(),
            fetched,
            ..CollectionReport::default()
        };
        for doc in &docs {
            match writer.write(doc) {
                Ok(true) => collection.written += 1,
                Ok(false) => collection.skipped += 1,
                Err(e) => {
                    error!(id = doc.id(), error = %e, "[SYNC][ERROR] Failed to write document");
                    collection.failed += 1;
                }
            }
        }
        info!(
            collection = %collection.collection,
            content_type = %collection.content_type,
            written = collection.written,
            skipped = collection.skipped,
            failed = collection.failed,
            "[SYNC] Collection written"
        );
        report.collections.push(collection);
    }

    info!(
        written = report.written(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}

/// Documents keyed by content type id.
fn build_documents(
    schema: &ResolvedSchema,
    cache: &EntryCache,
    selected: &[Selected<'_>],
    per_collection: Vec<Vec<RawEntry>>,
) -> IndexMap<String, Vec<Document>> {
    let builder = DocumentBuilder::new(schema, cache);
    let mut documents: IndexMap<String, Vec<Document>> = IndexMap::new();

    for (s, entries) in selected.iter().zip(per_collection) {
        let built: Vec<Document> = entries
            .iter()
            .map(|raw| builder.build(raw, s.config))
            .collect();
        info!(collection = s.key, documents = built.len(), "[SYNC] Built documents");
        documents.insert(s.type_id.to_string(), built);
    }
    documents
}
