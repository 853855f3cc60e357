//! In-memory [`QueryExecutor`] for tests.
//!
//! Documents live in a `HashMap` of databases behind `std::sync::RwLock`.
//! There is no query engine: each query text is answered by a handler
//! registered for exactly that text, and anything unregistered yields an
//! empty result. Every executed query is recorded so tests can assert on
//! round trips.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::QueryExecutor;

type Databases = HashMap<String, BTreeMap<String, String>>;
type Handler = Arc<dyn Fn(&Snapshot<'_>) -> Result<String> + Send + Sync>;

/// Read-only view of the stored documents handed to query handlers.
pub struct Snapshot<'a> {
    databases: &'a Databases,
}

impl Snapshot<'_> {
    pub fn document(&self, database: &str, name: &str) -> Option<&str> {
        self.databases
            .get(database)
            .and_then(|docs| docs.get(name))
            .map(String::as_str)
    }

    /// Names of the documents in `database` starting with `prefix`, sorted.
    pub fn names(&self, database: &str, prefix: &str) -> Vec<&str> {
        self.databases
            .get(database)
            .map(|docs| {
                docs.keys()
                    .filter(|n| n.starts_with(prefix))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn database_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.databases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Scriptable executor for engine tests.
pub struct InMemoryExecutor {
    databases: RwLock<Databases>,
    handlers: RwLock<HashMap<String, Handler>>,
    failing: RwLock<HashSet<String>>,
    executed: RwLock<Vec<String>>,
    recursive: bool,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            executed: RwLock::new(Vec::new()),
            recursive: true,
        }
    }

    /// Report whether recursive functions are available.
    pub fn with_recursive_queries(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Answer `query` with `handler` from now on.
    pub fn on_query<F>(&self, query: impl Into<String>, handler: F)
    where
        F: Fn(&Snapshot<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap()
            .insert(query.into(), Arc::new(handler));
    }

    /// Answer `query` with a fixed result.
    pub fn respond(&self, query: impl Into<String>, result: impl Into<String>) {
        let result = result.into();
        self.on_query(query, move |_| Ok(result.clone()));
    }

    /// Fail every execution of `query` with a query error.
    pub fn fail_on(&self, query: impl Into<String>) {
        self.failing.write().unwrap().insert(query.into());
    }

    pub fn clear_failures(&self) {
        self.failing.write().unwrap().clear();
    }

    pub fn document(&self, database: &str, name: &str) -> Option<String> {
        self.databases
            .read()
            .unwrap()
            .get(database)
            .and_then(|docs| docs.get(name))
            .cloned()
    }

    pub fn document_names(&self, database: &str) -> Vec<String> {
        self.databases
            .read()
            .unwrap()
            .get(database)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every query executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.read().unwrap().clone()
    }

    pub fn times_executed(&self, query: &str) -> usize {
        self.executed
            .read()
            .unwrap()
            .iter()
            .filter(|q| q.as_str() == query)
            .count()
    }
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn execute(&self, _database: &str, query: &str) -> Result<String> {
        self.executed.write().unwrap().push(query.to_string());
        if self.failing.read().unwrap().contains(query) {
            return Err(Error::query("in-memory store", "forced failure"));
        }
        let handler = self.handlers.read().unwrap().get(query).cloned();
        match handler {
            Some(handler) => {
                let databases = self.databases.read().unwrap();
                handler(&Snapshot {
                    databases: &databases,
                })
            }
            None => Ok(String::new()),
        }
    }

    async fn add_document(&self, database: &str, name: &str, content: &str) -> Result<()> {
        self.databases
            .write()
            .unwrap()
            .entry(database.to_string())
            .or_default()
            .insert(name.to_string(), content.to_string());
        Ok(())
    }

    async fn delete_document(&self, database: &str, name: &str) -> Result<()> {
        if let Some(docs) = self.databases.write().unwrap().get_mut(database) {
            docs.remove(name);
        }
        Ok(())
    }

    async fn exists(&self, database: &str) -> Result<bool> {
        Ok(self.databases.read().unwrap().contains_key(database))
    }

    async fn create_or_reset(&self, database: &str) -> Result<()> {
        self.databases
            .write()
            .unwrap()
            .insert(database.to_string(), BTreeMap::new());
        Ok(())
    }

    fn supports_recursive_queries(&self) -> bool {
        self.recursive
    }
}
