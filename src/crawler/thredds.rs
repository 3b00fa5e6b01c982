//! THREDDS-style crawler with version reconciliation
//!
//! The crawler walks a tree of nested catalog documents. Each top-level
//! dataset node becomes one record; catalog references are resolved,
//! normalized and recursed into. Sub-catalog failures are logged and the
//! subtree skipped, leaving sibling subtrees untouched.
//!
//! The publish branch reconciles dataset versions: the index must never
//! hold zero or two `latest` records for one master id, so demoted older
//! editions travel in the same batch as the newly published edition.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CrawlListener, CrawlOptions, Crawler};
use crate::catalog::location;
use crate::catalog::source::CatalogSource;
use crate::catalog::{Catalog, DatasetNode};
use crate::index::{IndexClient, IndexError};
use crate::models::{CrawlStats, Record, RecordType};
use crate::pipeline::RecordProducer;
use crate::utils::error::CrawlError;
use crate::utils::retry::{with_retry, Backoff};
use crate::validation::RecordValidator;
use async_trait::async_trait;

/// Crawler for THREDDS-style catalog trees
pub struct ThreddsCrawler {
    source: Arc<dyn CatalogSource>,

    /// Index handle for reconciliation lookups
    index: IndexClient,

    /// Consumer chain for the publish branch
    publisher: Arc<RecordProducer>,

    /// Consumer chain for the unpublish branch
    remover: Arc<RecordProducer>,

    validator: Arc<RecordValidator>,

    listeners: Vec<Arc<dyn CrawlListener>>,

    /// Hostname recorded on every produced record
    publishing_host: String,

    /// Cooperative cancellation flag, checked between sibling visits
    cancelled: Arc<AtomicBool>,

    /// Retry policy for reconciliation lookups against the index
    lookup_retry: Backoff,
}

impl ThreddsCrawler {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        index: IndexClient,
        publisher: Arc<RecordProducer>,
        remover: Arc<RecordProducer>,
        validator: Arc<RecordValidator>,
        publishing_host: impl Into<String>,
    ) -> Self {
        Self {
            source,
            index,
            publisher,
            remover,
            validator,
            listeners: Vec::new(),
            publishing_host: publishing_host.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
            lookup_retry: Backoff::new(2, Duration::from_millis(250), Duration::from_secs(2)),
        }
    }

    /// Register an auditing listener
    pub fn add_listener(&mut self, listener: Arc<dyn CrawlListener>) {
        self.listeners.push(listener);
    }

    /// Handle for cooperative cancellation of a running crawl
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn check_cancelled(&self) -> Result<(), CrawlError> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(CrawlError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Crawl one catalog node and, when `recursive` is set, its subtree.
    ///
    /// `fatal` is true only for the root: a root catalog that cannot be
    /// loaded fails the operation, while sub-catalog failures are logged
    /// and their subtree skipped.
    fn crawl_node<'a>(
        &'a self,
        loc: &'a str,
        options: &'a CrawlOptions,
        visited: &'a mut HashSet<String>,
        stats: &'a mut CrawlStats,
        fatal: bool,
    ) -> BoxFuture<'a, Result<(), CrawlError>> {
        async move {
            self.check_cancelled()?;

            let normalized = location::normalize(loc)?;
            if !visited.insert(normalized.clone()) {
                debug!(location = %normalized, "Catalog already visited, skipping");
                return Ok(());
            }

            for listener in &self.listeners {
                listener.before_crawling(&normalized);
            }

            let catalog = match self.source.fetch(&normalized).await {
                Ok(c) => c,
                Err(e) => {
                    for listener in &self.listeners {
                        listener.after_crawling_error(&normalized);
                    }
                    if fatal {
                        return Err(e);
                    }
                    warn!(location = %normalized, error = %e, "Skipping sub-catalog");
                    stats.subtrees_skipped += 1;
                    stats.errors += 1;
                    return Ok(());
                }
            };

            stats.catalogs_visited += 1;

            for dataset in &catalog.datasets {
                self.check_cancelled()?;

                if let Err(e) = self.process_dataset(dataset, options, stats).await {
                    // one node fails independently of its siblings
                    warn!(
                        dataset = %dataset.name,
                        location = %normalized,
                        error = %e,
                        "Dataset node skipped"
                    );
                    stats.errors += 1;
                }
            }

            if options.recursive {
                for reference in collect_references(&catalog) {
                    self.check_cancelled()?;

                    let resolved = match location::resolve_reference(&normalized, &reference) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(reference = %reference, error = %e, "Unresolvable reference");
                            stats.subtrees_skipped += 1;
                            stats.errors += 1;
                            continue;
                        }
                    };

                    if let Some(filter) = &options.filter {
                        if !filter.is_match(&resolved) {
                            debug!(location = %resolved, "Reference excluded by filter");
                            continue;
                        }
                    }

                    self.crawl_node(&resolved, options, visited, stats, false).await?;
                }
            }

            for listener in &self.listeners {
                listener.after_crawling_success(&normalized);
            }

            Ok(())
        }
        .boxed()
    }

    /// Publish or unpublish the record for one top-level dataset node.
    ///
    /// File-level records are produced by a separate pass; this walk only
    /// emits the dataset record itself.
    async fn process_dataset(
        &self,
        node: &DatasetNode,
        options: &CrawlOptions,
        stats: &mut CrawlStats,
    ) -> Result<(), CrawlError> {
        if !node.is_harvestable() {
            return Err(CrawlError::MissingIdentifier {
                location: node.name.clone(),
            });
        }

        if options.publish {
            let record = self.record_from_node(node, options);
            self.validator.validate(&record, options.schema.as_deref())?;

            let batch = self.reconcile(record).await?;

            let count = batch.len() as u32;
            self.publisher
                .notify_batch(&batch)
                .await
                .map_err(CrawlError::Consumer)?;
            stats.records_published += count;
        } else {
            // stub by id only; the engine cascades child removal through
            // the dataset_id query clause
            let id = node.id.clone().unwrap_or_default();
            let stub = Record::new(id, RecordType::Dataset);
            self.remover
                .notify(&stub)
                .await
                .map_err(CrawlError::Consumer)?;
            stats.records_removed += 1;
        }

        Ok(())
    }

    /// Build the canonical record for a dataset node
    fn record_from_node(&self, node: &DatasetNode, options: &CrawlOptions) -> Record {
        let id = node.id.clone().unwrap_or_default();
        let mut record = Record::new(id, RecordType::Dataset).with_version(node.version());

        if let Some(master) = node.master_id() {
            record.master_id = master;
        }
        record.replica = options.replica;

        record.set_field("title", node.name.as_str());
        record.set_field("data_node", self.publishing_host.as_str());

        for property in &node.properties {
            record.add_field(property.name.as_str(), property.value.as_str());
        }

        for access in &node.access {
            record.add_field("url", format!("{}|{}", access.url, access.service_type));
        }

        for doc in &node.documentation {
            record.add_field("description", doc.content.as_str());
        }

        if let Some(geo) = &node.geospatial {
            record.set_field("north_degrees", geo.north.to_string());
            record.set_field("south_degrees", geo.south.to_string());
            record.set_field("east_degrees", geo.east.to_string());
            record.set_field("west_degrees", geo.west.to_string());
        }

        if let Some(time) = &node.temporal {
            if let Some(start) = &time.start {
                record.set_field("datetime_start", start.as_str());
            }
            if let Some(end) = &time.end {
                record.set_field("datetime_stop", end.as_str());
            }
        }

        if let Some(schema) = &options.schema {
            record.set_field("metadata_schema", schema.as_str());
        }

        record
    }

    /// Decide latest flags against the already-indexed editions.
    ///
    /// Returns the batch to deliver: demoted older editions first, the new
    /// edition last. The whole batch travels in one notify call so the
    /// index never observes an intermediate state with zero or two latest
    /// records for the same master id.
    async fn reconcile(&self, mut record: Record) -> Result<Vec<Record>, CrawlError> {
        // a missing or malformed master id must not break reconciliation:
        // with nothing to group on the record publishes as latest
        if record.master_id.is_empty() {
            record.latest = true;
            return Ok(vec![record]);
        }

        // transient lookup failures retry; a config-level failure such as
        // an unmapped core bails immediately
        let existing = with_retry(&self.lookup_retry, IndexError::is_recoverable, || {
            self.index.latest_editions(&record.master_id)
        })
        .await
        .map_err(|e| CrawlError::Index(e.into()))?;

        let mut batch = Vec::new();
        record.latest = true;

        for edition in existing {
            if edition.version == record.version {
                // republish of the current edition: no reconciliation action
                continue;
            }

            if edition.version < record.version {
                info!(
                    master_id = %record.master_id,
                    old_version = edition.version,
                    new_version = record.version,
                    "Demoting superseded edition"
                );
                batch.push(edition.demoted());
            } else if edition.version > record.version {
                // someone is re-indexing an old edition; the existing
                // latest stays untouched
                info!(
                    master_id = %record.master_id,
                    indexed_version = edition.version,
                    new_version = record.version,
                    "Publishing old edition as non-latest"
                );
                record.latest = false;
            }
        }

        batch.push(record);
        Ok(batch)
    }
}

/// Catalog references from the top level and from inside dataset nodes
fn collect_references(catalog: &Catalog) -> Vec<String> {
    fn walk(node: &DatasetNode, out: &mut Vec<String>) {
        for reference in &node.references {
            out.push(reference.href.clone());
        }
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut refs: Vec<String> = catalog.references.iter().map(|r| r.href.clone()).collect();
    for dataset in &catalog.datasets {
        walk(dataset, &mut refs);
    }
    refs
}

#[async_trait]
impl Crawler for ThreddsCrawler {
    async fn crawl(
        &self,
        location: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlStats, CrawlError> {
        self.cancelled.store(false, Ordering::SeqCst);

        let mut stats = CrawlStats::begin();
        let mut visited = HashSet::new();

        self.crawl_node(location, options, &mut visited, &mut stats, true)
            .await?;

        stats.finish();
        let host = crate::utils::extract_host(location).unwrap_or_else(|_| location.to_string());
        info!(
            host = %host,
            catalogs = stats.catalogs_visited,
            published = stats.records_published,
            removed = stats.records_removed,
            skipped = stats.subtrees_skipped,
            errors = stats.errors,
            elapsed_secs = ?stats.elapsed_secs(),
            "Crawl finished"
        );
        Ok(stats)
    }
}
