//! Document store abstraction.
//!
//! The [`QueryExecutor`] trait is the only seam between the engine and a
//! live store: it runs query text and manages named documents. The engine
//! never parses transport details; implementations translate their own
//! failures into [`Error::Query`](crate::error::Error::Query).
//!
//! Implementations must be `Send + Sync` so a single executor can be shared
//! behind an `Arc` by concurrent callers.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

/// Abstract document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`execute`](QueryExecutor::execute) | Run query text, return the raw result |
/// | [`add_document`](QueryExecutor::add_document) | Store a document under a name |
/// | [`delete_document`](QueryExecutor::delete_document) | Remove a named document |
/// | [`exists`](QueryExecutor::exists) | Check whether the database exists |
/// | [`create_or_reset`](QueryExecutor::create_or_reset) | Drop and recreate the database |
/// | [`create_indexes`](QueryExecutor::create_indexes) | Rebuild store-side indexes |
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run query text (including update expressions) against `database`
    /// and return the raw textual result.
    async fn execute(&self, database: &str, query: &str) -> Result<String>;

    /// Store `content` under `name` within `database`, replacing any
    /// document already stored under that name.
    async fn add_document(&self, database: &str, name: &str, content: &str) -> Result<()>;

    /// Remove the document `name` from `database`. Removing a document
    /// that does not exist is not an error.
    async fn delete_document(&self, database: &str, name: &str) -> Result<()>;

    async fn exists(&self, database: &str) -> Result<bool>;

    async fn create_or_reset(&self, database: &str) -> Result<()>;

    async fn create_indexes(&self, _database: &str) -> Result<()> {
        Ok(())
    }

    /// Whether the store evaluates user-declared recursive functions.
    /// Branch deletion falls back to a client-side traversal when not.
    fn supports_recursive_queries(&self) -> bool {
        true
    }
}
