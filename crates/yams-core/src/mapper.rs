//! Typed decoding of raw query results.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::codec::{Entity, EntityCodec, EntityKind};
use crate::error::{Error, Result};
use crate::models::{
    BranchLevel, DatabaseList, DatabaseStats, DocumentNode, FacetTreeNode, FacetType, IconTable,
    LinkSet, SearchResults,
};

/// Decodes store output through an [`EntityCodec`] and logs how long the
/// round trip took, measured from the caller's `started` instant.
#[derive(Clone)]
pub struct ResultMapper {
    codec: Arc<dyn EntityCodec>,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn unexpected(kind: EntityKind, entity: &Entity) -> Error {
    Error::decode(
        kind.name(),
        format!("codec returned {}", entity.kind().name()),
    )
}

impl ResultMapper {
    pub fn new(codec: Arc<dyn EntityCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &Arc<dyn EntityCodec> {
        &self.codec
    }

    fn decode(&self, raw: &str, kind: EntityKind, started: Instant) -> Result<Entity> {
        let entity = self.codec.decode(raw, kind)?;
        debug!(
            kind = kind.name(),
            "Query time: {}ms for {} entities",
            elapsed_ms(started),
            entity.len()
        );
        Ok(entity)
    }

    pub fn document_nodes(&self, raw: &str, started: Instant) -> Result<Vec<DocumentNode>> {
        match self.decode(raw, EntityKind::DocumentNodes, started)? {
            Entity::DocumentNodes(nodes) => Ok(nodes),
            other => Err(unexpected(EntityKind::DocumentNodes, &other)),
        }
    }

    pub fn search_results(&self, raw: &str, started: Instant) -> Result<SearchResults> {
        match self.decode(raw, EntityKind::SearchResults, started)? {
            Entity::SearchResults(results) => Ok(results),
            other => Err(unexpected(EntityKind::SearchResults, &other)),
        }
    }

    pub fn facet_types(&self, raw: &str, started: Instant) -> Result<Vec<FacetType>> {
        match self.decode(raw, EntityKind::FacetTypes, started)? {
            Entity::FacetTypes(types) => Ok(types),
            other => Err(unexpected(EntityKind::FacetTypes, &other)),
        }
    }

    pub fn facet_tree(&self, raw: &str, started: Instant) -> Result<FacetTreeNode> {
        match self.decode(raw, EntityKind::FacetTree, started)? {
            Entity::FacetTree(tree) => Ok(tree),
            other => Err(unexpected(EntityKind::FacetTree, &other)),
        }
    }

    pub fn link_set(&self, raw: &str, started: Instant) -> Result<LinkSet> {
        match self.decode(raw, EntityKind::LinkSet, started)? {
            Entity::LinkSet(links) => Ok(links),
            other => Err(unexpected(EntityKind::LinkSet, &other)),
        }
    }

    /// Decode stats and stamp them with the elapsed query time.
    pub fn database_stats(&self, raw: &str, started: Instant) -> Result<DatabaseStats> {
        match self.decode(raw, EntityKind::DatabaseStats, started)? {
            Entity::DatabaseStats(mut stats) => {
                stats.query_time_ms = elapsed_ms(started);
                Ok(stats)
            }
            other => Err(unexpected(EntityKind::DatabaseStats, &other)),
        }
    }

    pub fn database_list(&self, raw: &str, started: Instant) -> Result<DatabaseList> {
        match self.decode(raw, EntityKind::DatabaseList, started)? {
            Entity::DatabaseList(mut list) => {
                list.query_time_ms = elapsed_ms(started);
                Ok(list)
            }
            other => Err(unexpected(EntityKind::DatabaseList, &other)),
        }
    }

    pub fn branch_level(&self, raw: &str, started: Instant) -> Result<BranchLevel> {
        match self.decode(raw, EntityKind::BranchLevel, started)? {
            Entity::BranchLevel(level) => Ok(level),
            other => Err(unexpected(EntityKind::BranchLevel, &other)),
        }
    }

    pub fn icon_table(&self, raw: &str, started: Instant) -> Result<IconTable> {
        match self.decode(raw, EntityKind::IconTable, started)? {
            Entity::IconTable(icons) => Ok(icons),
            other => Err(unexpected(EntityKind::IconTable, &other)),
        }
    }

    pub fn encode_icon_table(&self, icons: &IconTable) -> Result<String> {
        self.codec.encode(&Entity::IconTable(icons.clone()))
    }

    pub fn encode_node(&self, node: &DocumentNode) -> Result<String> {
        self.codec.encode(&Entity::DocumentNode(node.clone()))
    }
}
