//! Cached aggregate documents.
//!
//! Expensive aggregates are stored as named documents. Presence is trusted
//! as freshness: there is no TTL, and the only way to force recomputation is
//! [`CacheManager::invalidate`]. Two callers racing on a cold entry may both
//! compute and both persist; the last write wins and either copy is valid.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::query::{QueryBuilder, CACHED_MARKER, NOT_CACHED_MARKER};

#[derive(Clone)]
pub struct CacheManager {
    executor: Arc<dyn QueryExecutor>,
    queries: QueryBuilder,
}

impl CacheManager {
    pub fn new(executor: Arc<dyn QueryExecutor>, queries: QueryBuilder) -> Self {
        Self { executor, queries }
    }

    /// Return the stored copy of `document_name`, or run `compute_query`,
    /// persist its result with the cached marker set, and return it as
    /// computed.
    ///
    /// A fresh computation therefore still reports itself as not cached;
    /// every later call returns the persisted bytes.
    pub async fn get_or_compute(&self, document_name: &str, compute_query: &str) -> Result<String> {
        let database = self.queries.name();
        let lookup = self.queries.cached_document_query(document_name);
        let stored = self.executor.execute(database, &lookup).await?;
        if !stored.trim().is_empty() {
            debug!(document = document_name, "using cached aggregate");
            return Ok(stored);
        }

        info!(document = document_name, "computing aggregate");
        let computed = self.executor.execute(database, compute_query).await?;
        let tagged = computed.replacen(NOT_CACHED_MARKER, CACHED_MARKER, 1);
        self.executor
            .add_document(database, document_name, &tagged)
            .await?;
        Ok(computed)
    }

    /// Drop a cached document so the next lookup recomputes it.
    pub async fn invalidate(&self, document_name: &str) -> Result<()> {
        debug!(document = document_name, "invalidating cached aggregate");
        self.executor
            .delete_document(self.queries.name(), document_name)
            .await
    }
}
