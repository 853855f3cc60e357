//! Crawler link-state tracking.
//!
//! The stored `DatabaseLinks` document partitions every id the crawler has
//! seen into root, missing and recent links. Merges are single update
//! queries, so a merge is atomic at the store even though the existence
//! check that precedes it is a separate round trip.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::mapper::ResultMapper;
use crate::models::{LinkCounts, LinkSet, NodeLink};
use crate::query::{QueryBuilder, CRAWLER_STATS_COLLECTION, LINKS_DOCUMENT};

#[derive(Clone)]
pub struct LinkStateTracker {
    executor: Arc<dyn QueryExecutor>,
    queries: QueryBuilder,
    mapper: ResultMapper,
    audit: bool,
}

impl LinkStateTracker {
    pub fn new(executor: Arc<dyn QueryExecutor>, queries: QueryBuilder, mapper: ResultMapper) -> Self {
        Self {
            executor,
            queries,
            mapper,
            audit: false,
        }
    }

    /// Write a `CrawlerStats/{timestamp}` record after each crawl cycle.
    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    /// Create the link document if the store has none yet.
    async fn ensure_links_document(&self) -> Result<()> {
        let database = self.queries.name();
        let state = self
            .executor
            .execute(database, &self.queries.links_exist_query())
            .await?;
        match state.trim() {
            "1" => Ok(()),
            "0" => {
                debug!(database, "creating link document");
                self.executor
                    .add_document(database, LINKS_DOCUMENT, &QueryBuilder::empty_links_document())
                    .await
            }
            other => Err(Error::query(
                "link state check",
                format!("unexpected state for {} document: {:?}", LINKS_DOCUMENT, other),
            )),
        }
    }

    /// Merge a crawler batch into the stored partition.
    ///
    /// Fetched ids leave the missing list, stored roots that became some
    /// record's child are dropped, root candidates already tracked or
    /// already a child are skipped, and newly seen ids become missing. Merging the same batch twice changes nothing the
    /// second time.
    pub async fn merge_discovered(&self, batch: &LinkSet) -> Result<()> {
        let batch = batch.normalized();
        self.ensure_links_document().await?;
        if batch.is_empty() {
            return Ok(());
        }
        debug!(
            roots = batch.root_links.len(),
            missing = batch.missing_links.len(),
            recent = batch.recent_links.len(),
            "merging links"
        );
        self.executor
            .execute(self.queries.name(), &self.queries.merge_links_query(&batch))
            .await?;
        Ok(())
    }

    /// Up to `limit` missing links, optionally only those whose URI
    /// contains `uri_filter`.
    pub async fn next_missing(&self, limit: usize, uri_filter: Option<&str>) -> Result<Vec<NodeLink>> {
        let query = self.queries.next_missing_query(limit, uri_filter)?;
        let started = Instant::now();
        let raw = self.executor.execute(self.queries.name(), &query).await?;
        Ok(self.mapper.link_set(&raw, started)?.missing_links)
    }

    /// One crawler pass: merge `batch`, then fetch the next missing links.
    pub async fn missing_links(
        &self,
        batch: &LinkSet,
        limit: usize,
        uri_filter: Option<&str>,
    ) -> Result<Vec<NodeLink>> {
        let started = Instant::now();
        self.merge_discovered(batch).await?;
        let next = self.next_missing(limit, uri_filter).await?;
        self.record_crawl_stats(started, next.len()).await;
        Ok(next)
    }

    pub async fn link_counts(&self) -> Result<LinkCounts> {
        let raw = self
            .executor
            .execute(self.queries.name(), &self.queries.link_counts_query())
            .await?;
        let counts: Vec<u64> = raw
            .split_whitespace()
            .map(str::parse::<u64>)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::query("link counts", e))?;
        match counts.as_slice() {
            [missing, recent, documents] => Ok(LinkCounts {
                missing: *missing,
                recent: *recent,
                documents: *documents,
            }),
            _ => Err(Error::query(
                "link counts",
                format!("expected three counts, got {:?}", raw.trim()),
            )),
        }
    }

    /// Append an audit record. Failures are logged and otherwise ignored.
    async fn record_crawl_stats(&self, started: Instant, batch: usize) {
        if !self.audit {
            return;
        }
        let database = self.queries.name();
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let query_ms = started.elapsed().as_millis() as u64;
        let query = self.queries.crawler_stats_query(query_ms, batch, &timestamp);
        let name = format!("{}/{}", CRAWLER_STATS_COLLECTION, timestamp);
        let result = match self.executor.execute(database, &query).await {
            Ok(record) => self.executor.add_document(database, &name, &record).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(document = %name, error = %e, "could not write crawl statistics");
        }
    }
}
