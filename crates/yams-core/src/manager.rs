//! Engine facade.
//!
//! [`DatabaseManager`] wires a [`QueryExecutor`] and an [`EntityCodec`] into
//! the query builder, cache, link tracker, branch deleter and result mapper
//! for one database, and exposes every engine operation as one async
//! method. It holds no mutable state of its own and is cheap to clone.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::branch::BranchDeleter;
use crate::cache::CacheManager;
use crate::codec::{EntityCodec, XmlCodec};
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::links::LinkStateTracker;
use crate::mapper::ResultMapper;
use crate::models::{
    DatabaseList, DatabaseStats, DocumentId, DocumentNode, FacetTreeNode, FacetType, IconTable,
    LinkCounts, LinkSet, NodeLink, SearchRequest, SearchResults,
};
use crate::query::{
    document_name, tree_document_name, FacetQueryKind, NodeAttribute, QueryBuilder,
    ICON_TABLE_DOCUMENT, STATS_DOCUMENT,
};

/// What to do when an insert finds its id already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    Fail,
    #[default]
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    SkippedDuplicate,
}

#[derive(Clone)]
pub struct DatabaseManager {
    executor: Arc<dyn QueryExecutor>,
    queries: QueryBuilder,
    mapper: ResultMapper,
    cache: CacheManager,
    links: LinkStateTracker,
    branches: BranchDeleter,
}

impl DatabaseManager {
    /// A manager for `database` decoding results with [`XmlCodec`].
    pub fn new(executor: Arc<dyn QueryExecutor>, database: &str) -> Result<Self> {
        Self::with_codec(executor, Arc::new(XmlCodec), database)
    }

    pub fn with_codec(
        executor: Arc<dyn QueryExecutor>,
        codec: Arc<dyn EntityCodec>,
        database: &str,
    ) -> Result<Self> {
        let queries = QueryBuilder::new(database)?;
        let mapper = ResultMapper::new(codec);
        Ok(Self {
            cache: CacheManager::new(executor.clone(), queries.clone()),
            links: LinkStateTracker::new(executor.clone(), queries.clone(), mapper.clone()),
            branches: BranchDeleter::new(executor.clone(), queries.clone(), mapper.clone()),
            executor,
            queries,
            mapper,
        })
    }

    /// Write crawl audit records after each [`missing_links`](Self::missing_links) pass.
    pub fn with_audit(mut self, audit: bool) -> Self {
        self.links = self.links.with_audit(audit);
        self
    }

    pub fn database(&self) -> &str {
        self.queries.name()
    }

    pub fn queries(&self) -> &QueryBuilder {
        &self.queries
    }

    async fn execute(&self, query: &str) -> Result<String> {
        trace!(query, "executing");
        self.executor.execute(self.queries.name(), query).await
    }

    // ============ Database lifecycle ============

    /// Create the database if the store does not have it.
    pub async fn check_db_exists(&self) -> Result<()> {
        if !self.executor.exists(self.database()).await? {
            info!(database = self.database(), "creating database");
            self.executor.create_or_reset(self.database()).await?;
        }
        Ok(())
    }

    /// Drop every stored document, including caches and link state.
    pub async fn drop_all_records(&self) -> Result<()> {
        info!(database = self.database(), "resetting database");
        self.executor.create_or_reset(self.database()).await
    }

    pub async fn create_indexes(&self) -> Result<()> {
        let started = Instant::now();
        self.executor.create_indexes(self.database()).await?;
        info!(
            database = self.database(),
            "indexes created in {}ms",
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// Forget the cached stats document; the next stats call recomputes.
    pub async fn clear_database_stats(&self) -> Result<()> {
        self.cache.invalidate(STATS_DOCUMENT).await
    }

    // ============ Aggregates ============

    pub async fn database_list(&self) -> Result<Vec<String>> {
        let raw = self.execute(&self.queries.database_list_query()).await?;
        Ok(raw.split_whitespace().map(str::to_string).collect())
    }

    pub async fn database_stats_list(&self) -> Result<DatabaseList> {
        let started = Instant::now();
        let raw = self.execute(&self.queries.database_stats_list_query()).await?;
        self.mapper.database_list(&raw, started)
    }

    pub async fn database_stats(&self) -> Result<DatabaseStats> {
        let started = Instant::now();
        let raw = self
            .cache
            .get_or_compute(STATS_DOCUMENT, &self.queries.database_stats_query())
            .await?;
        self.mapper.database_stats(&raw, started)
    }

    pub async fn metadata_types(&self, filter: Option<&FacetType>) -> Result<Vec<FacetType>> {
        let started = Instant::now();
        let raw = self
            .cache
            .get_or_compute(
                &document_name(FacetQueryKind::Types, filter),
                &self.queries.metadata_types_query(filter),
            )
            .await?;
        self.mapper.facet_types(&raw, started)
    }

    pub async fn metadata_paths(&self, filter: Option<&FacetType>) -> Result<Vec<FacetType>> {
        let started = Instant::now();
        let raw = self
            .cache
            .get_or_compute(
                &document_name(FacetQueryKind::Paths, filter),
                &self.queries.metadata_paths_query(filter),
            )
            .await?;
        self.mapper.facet_types(&raw, started)
    }

    /// Distinct field values; never cached, since the result depends on
    /// `max_results`.
    pub async fn field_values(&self, filter: Option<&FacetType>, max_results: usize) -> Result<Vec<FacetType>> {
        let query = self.queries.field_values_query(filter, max_results)?;
        let started = Instant::now();
        let raw = self.execute(&query).await?;
        self.mapper.facet_types(&raw, started)
    }

    pub async fn tree_facet_types(&self, filters: &[FacetType]) -> Result<Vec<FacetType>> {
        let query = self.queries.tree_facets_query(filters)?;
        let started = Instant::now();
        let raw = self
            .cache
            .get_or_compute(&tree_document_name(filters), &query)
            .await?;
        self.mapper.facet_types(&raw, started)
    }

    pub async fn facet_tree(&self, type_filter: Option<&FacetType>, field_labels: &[String]) -> Result<FacetTreeNode> {
        let query = self.queries.facet_tree_query(type_filter, field_labels)?;
        let started = Instant::now();
        let raw = self.execute(&query).await?;
        self.mapper.facet_tree(&raw, started)
    }

    // ============ Browsing ============

    pub async fn root_nodes(&self) -> Result<Vec<DocumentNode>> {
        let started = Instant::now();
        let raw = self.execute(&self.queries.root_nodes_query()).await?;
        self.mapper.document_nodes(&raw, started)
    }

    /// Children of the record whose `attribute` equals `value`, sliced to
    /// the page window `(start, end]`.
    pub async fn child_nodes(
        &self,
        attribute: NodeAttribute,
        value: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<DocumentNode>> {
        let query = self.queries.child_nodes_query(attribute, value, start, end)?;
        let started = Instant::now();
        let raw = self.execute(&query).await?;
        self.mapper.document_nodes(&raw, started)
    }

    async fn nodes_by_attribute(&self, attribute: NodeAttribute, values: &[&str]) -> Result<Vec<DocumentNode>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let raw = self
            .execute(&self.queries.nodes_by_attribute_query(attribute, values.iter().copied()))
            .await?;
        self.mapper.document_nodes(&raw, started)
    }

    /// Records with any of `ids`; results are not in input order.
    pub async fn nodes_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<DocumentNode>> {
        let values: Vec<&str> = ids.iter().map(DocumentId::as_str).collect();
        self.nodes_by_attribute(NodeAttribute::Id, &values).await
    }

    pub async fn nodes_by_handles(&self, handles: &[String]) -> Result<Vec<DocumentNode>> {
        let values: Vec<&str> = handles.iter().map(String::as_str).collect();
        self.nodes_by_attribute(NodeAttribute::ArchiveHandle, &values).await
    }

    pub async fn nodes_by_uris(&self, uris: &[String]) -> Result<Vec<DocumentNode>> {
        let values: Vec<&str> = uris.iter().map(String::as_str).collect();
        self.nodes_by_attribute(NodeAttribute::Uri, &values).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let query = self.queries.search_query(request)?;
        let started = Instant::now();
        let raw = self.execute(&query).await?;
        self.mapper.search_results(&raw, started)
    }

    // ============ Icons ============

    /// The stored icon table; empty before the first insert.
    pub async fn node_icons(&self) -> Result<IconTable> {
        let started = Instant::now();
        let raw = self.execute(&self.queries.node_icons_query()).await?;
        self.mapper.icon_table(&raw, started)
    }

    /// Replace the stored icon table with `icons` plus every stored icon
    /// for a type `icons` does not cover, and return the table written.
    ///
    /// A stored table that no longer decodes is overwritten.
    pub async fn insert_node_icons(&self, icons: IconTable) -> Result<IconTable> {
        let mut merged = icons;
        match self.node_icons().await {
            Ok(stored) => merged.merge_missing(stored),
            Err(Error::Decode { message, .. }) => {
                warn!(database = self.database(), %message, "replacing unreadable icon table");
            }
            Err(e) => return Err(e),
        }
        let content = self.mapper.encode_icon_table(&merged)?;
        self.executor
            .delete_document(self.database(), ICON_TABLE_DOCUMENT)
            .await?;
        self.executor
            .add_document(self.database(), ICON_TABLE_DOCUMENT, &content)
            .await?;
        info!(database = self.database(), icons = merged.len(), "icon table stored");
        Ok(merged)
    }

    // ============ Crawler ============

    /// Store a crawled record under `CrawledData/{id}`.
    pub async fn insert_node(&self, node: &DocumentNode, policy: DuplicatePolicy) -> Result<InsertOutcome> {
        if node.id.as_str().is_empty() {
            return Err(Error::invalid("document id must not be empty"));
        }
        let raw = self
            .execute(&self.queries.existing_document_query(&node.id))
            .await?;
        let count: u64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::query("existing document count", format!("unexpected count {:?}", raw.trim())))?;
        if count > 0 {
            let uri = node.uri.clone().unwrap_or_default();
            return match policy {
                DuplicatePolicy::Fail => Err(Error::DuplicateDocument {
                    id: node.id.to_string(),
                    uri,
                    count,
                }),
                DuplicatePolicy::Skip => {
                    debug!(id = %node.id, uri = %uri, count, "skipping existing document");
                    Ok(InsertOutcome::SkippedDuplicate)
                }
            };
        }
        let content = self.mapper.encode_node(node)?;
        self.executor
            .add_document(self.database(), &QueryBuilder::node_document_name(&node.id), &content)
            .await?;
        Ok(InsertOutcome::Inserted)
    }

    pub async fn merge_links(&self, batch: &LinkSet) -> Result<()> {
        self.links.merge_discovered(batch).await
    }

    pub async fn next_missing(&self, limit: usize, uri_filter: Option<&str>) -> Result<Vec<NodeLink>> {
        self.links.next_missing(limit, uri_filter).await
    }

    /// Merge a crawler batch and return the next links to fetch.
    pub async fn missing_links(&self, batch: &LinkSet, limit: usize, uri_filter: Option<&str>) -> Result<Vec<NodeLink>> {
        self.links.missing_links(batch, limit, uri_filter).await
    }

    pub async fn link_counts(&self) -> Result<LinkCounts> {
        self.links.link_counts().await
    }

    /// Delete the branch under `root`; see [`BranchDeleter`].
    pub async fn delete_branch(&self, root: &DocumentId) -> Result<usize> {
        self.branches.delete_branch(root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::memory::InMemoryExecutor;
    use crate::models::{NodeIcon, NodeType};

    fn manager(store: &Arc<InMemoryExecutor>) -> DatabaseManager {
        DatabaseManager::new(store.clone(), "unit-db").unwrap()
    }

    #[tokio::test]
    async fn test_check_db_exists_creates_once() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        db.check_db_exists().await.unwrap();
        assert!(store.exists("unit-db").await.unwrap());
        store.add_document("unit-db", "keep", "<x/>").await.unwrap();
        db.check_db_exists().await.unwrap();
        assert_eq!(store.document("unit-db", "keep").as_deref(), Some("<x/>"));
    }

    #[tokio::test]
    async fn test_empty_lookup_skips_store() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        assert!(db.nodes_by_ids(&[]).await.unwrap().is_empty());
        assert!(db.nodes_by_uris(&[]).await.unwrap().is_empty());
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_page_rejected_before_store() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        let err = db.child_nodes(NodeAttribute::Id, "a", 5, 1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_insert_duplicate_policies() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        let node = DocumentNode {
            id: "dup".into(),
            uri: Some("http://a/dup.cmdi".into()),
            ..Default::default()
        };
        let count_query = db.queries().existing_document_query(&node.id);
        store.respond(count_query.clone(), "0");
        assert_eq!(
            db.insert_node(&node, DuplicatePolicy::Fail).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert!(store.document("unit-db", "CrawledData/dup").is_some());

        store.respond(count_query, "1");
        assert_eq!(
            db.insert_node(&node, DuplicatePolicy::Skip).await.unwrap(),
            InsertOutcome::SkippedDuplicate
        );
        let err = db.insert_node(&node, DuplicatePolicy::Fail).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateDocument { count: 1, ref uri, .. } if uri == "http://a/dup.cmdi"
        ));
    }

    #[tokio::test]
    async fn test_link_counts_parse() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        store.respond(db.queries().link_counts_query(), "4\n0\n12");
        assert_eq!(
            db.link_counts().await.unwrap(),
            LinkCounts {
                missing: 4,
                recent: 0,
                documents: 12
            }
        );
        store.respond(db.queries().link_counts_query(), "4");
        assert!(matches!(db.link_counts().await, Err(Error::Query { .. })));
    }

    fn icon(label: &str, image: &[u8]) -> NodeIcon {
        NodeIcon::from_image(
            NodeType {
                label: Some(label.into()),
                format: Some("imdi".into()),
            },
            image,
        )
    }

    fn serve_icon_table(store: &Arc<InMemoryExecutor>, db: &DatabaseManager) {
        store.on_query(db.queries().node_icons_query(), |docs| {
            Ok(docs
                .document("unit-db", ICON_TABLE_DOCUMENT)
                .unwrap_or_default()
                .to_string())
        });
    }

    #[tokio::test]
    async fn test_node_icons_empty_before_first_insert() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        serve_icon_table(&store, &db);
        assert!(db.node_icons().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_node_icons_merges_stored_table() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        serve_icon_table(&store, &db);

        let first = IconTable {
            icons: vec![icon("Session", b"session-v1"), icon("Corpus", b"corpus")],
        };
        assert_eq!(db.insert_node_icons(first).await.unwrap().len(), 2);

        let update = IconTable {
            icons: vec![icon("Session", b"session-v2"), icon("Actor", b"actor")],
        };
        let written = db.insert_node_icons(update).await.unwrap();
        assert_eq!(written.len(), 3);

        let stored = db.node_icons().await.unwrap();
        assert_eq!(stored, written);
        let image = |label: &str| {
            stored
                .icon_for_label(label)
                .unwrap()
                .image_bytes()
                .unwrap()
        };
        assert_eq!(image("Session"), b"session-v2".to_vec());
        assert_eq!(image("Corpus"), b"corpus".to_vec());
        assert_eq!(image("Actor"), b"actor".to_vec());
        assert_eq!(store.document_names("unit-db"), vec![ICON_TABLE_DOCUMENT.to_string()]);
    }

    #[tokio::test]
    async fn test_insert_node_icons_replaces_unreadable_table() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        serve_icon_table(&store, &db);
        store
            .add_document(
                "unit-db",
                ICON_TABLE_DOCUMENT,
                "<IconTable><NodeTypeImage><Image>AA==</Image></NodeTypeImage></IconTable>",
            )
            .await
            .unwrap();

        let written = db
            .insert_node_icons(IconTable {
                icons: vec![icon("Session", b"s")],
            })
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(db.node_icons().await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_insert_node_icons_keeps_table_when_lookup_fails() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        store
            .add_document("unit-db", ICON_TABLE_DOCUMENT, "<IconTable/>")
            .await
            .unwrap();
        store.fail_on(db.queries().node_icons_query());

        let err = db.insert_node_icons(IconTable::default()).await.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(
            store.document("unit-db", ICON_TABLE_DOCUMENT).as_deref(),
            Some("<IconTable/>")
        );
    }

    #[tokio::test]
    async fn test_database_list_splits_names() {
        let store = Arc::new(InMemoryExecutor::new());
        let db = manager(&store);
        store.respond("db:list()", "yams-data\nyams-test-data\n");
        assert_eq!(
            db.database_list().await.unwrap(),
            vec!["yams-data".to_string(), "yams-test-data".to_string()]
        );
    }
}
