//! Recursive branch deletion.
//!
//! A branch is a record plus everything reachable from it through
//! `ChildLink`s. Deleting it removes the records and turns any of their ids
//! listed as recent links back into missing links, so the next crawl pass
//! fetches them again. Root and missing link entries are left alone.
//!
//! When the store evaluates recursive functions the closure is computed and
//! deleted store-side. Otherwise the closure is walked breadth-first from
//! the client, one lookup per level, and deleted deepest level first.
//! Both modes carry a visited set, so cyclic links terminate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::mapper::ResultMapper;
use crate::models::DocumentId;
use crate::query::QueryBuilder;

#[derive(Clone)]
pub struct BranchDeleter {
    executor: Arc<dyn QueryExecutor>,
    queries: QueryBuilder,
    mapper: ResultMapper,
}

impl BranchDeleter {
    pub fn new(executor: Arc<dyn QueryExecutor>, queries: QueryBuilder, mapper: ResultMapper) -> Self {
        Self {
            executor,
            queries,
            mapper,
        }
    }

    /// Delete the branch under `root` and return how many distinct records
    /// it held. A branch that is already gone returns 0.
    pub async fn delete_branch(&self, root: &DocumentId) -> Result<usize> {
        if root.as_str().is_empty() {
            return Err(Error::invalid("branch root id must not be empty"));
        }
        let deleted = if self.executor.supports_recursive_queries() {
            self.delete_store_side(root).await?
        } else {
            self.delete_by_traversal(root).await?
        };
        info!(root = %root, deleted, "branch deleted");
        Ok(deleted)
    }

    async fn delete_store_side(&self, root: &DocumentId) -> Result<usize> {
        let database = self.queries.name();
        let raw = self
            .executor
            .execute(database, &self.queries.branch_closure_count_query(root))
            .await?;
        let closure: usize = raw
            .trim()
            .parse()
            .map_err(|_| Error::query("branch closure", format!("unexpected count {:?}", raw.trim())))?;
        if closure == 0 {
            return Ok(0);
        }
        self.executor
            .execute(database, &self.queries.branch_delete_query(root))
            .await?;
        Ok(closure)
    }

    /// Collect the closure level by level, starting at `root`.
    async fn closure_levels(&self, root: &DocumentId) -> Result<Vec<Vec<DocumentId>>> {
        let database = self.queries.name();
        let mut visited: HashSet<DocumentId> = HashSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];
        let mut levels = Vec::new();

        while !frontier.is_empty() {
            let started = Instant::now();
            let raw = self
                .executor
                .execute(database, &self.queries.branch_level_query(&frontier))
                .await?;
            let level = self.mapper.branch_level(&raw, started)?;

            let mut present = Vec::new();
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for entry in level.nodes {
                for child in entry.children {
                    if visited.insert(child.id.clone()) {
                        next.push(child.id);
                    }
                }
                if seen.insert(entry.id.clone()) {
                    present.push(entry.id);
                }
            }
            if present.is_empty() {
                break;
            }
            debug!(depth = levels.len(), records = present.len(), "branch level");
            levels.push(present);
            frontier = next;
        }
        Ok(levels)
    }

    async fn delete_by_traversal(&self, root: &DocumentId) -> Result<usize> {
        let levels = self.closure_levels(root).await?;
        let closure: usize = levels.iter().map(Vec::len).sum();
        let mut deleted = 0;
        for level in levels.iter().rev() {
            let outcome = self
                .executor
                .execute(self.queries.name(), &self.queries.delete_nodes_query(level))
                .await;
            match outcome {
                Ok(_) => deleted += level.len(),
                Err(e) if deleted > 0 => {
                    return Err(Error::PartialBranchDelete {
                        root: root.to_string(),
                        deleted,
                        closure,
                        source: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}
