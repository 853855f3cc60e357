//! # YAMS Core
//!
//! The query/link engine behind YAMS: typed models of crawled metadata
//! records, the query builder that turns browse, facet and search requests
//! into store queries, and the components that keep crawler link state and
//! cached aggregates consistent.
//!
//! This crate does no HTTP, filesystem or configuration work. A live store
//! is reached only through the [`QueryExecutor`] trait; the root `yams`
//! package provides the REST binding.
//!
//! ```text
//! caller ─▶ DatabaseManager ─▶ QueryBuilder ─▶ CacheManager? ─▶ QueryExecutor
//!                 ▲                                                  │
//!                 └──────────────── ResultMapper ◀── EntityCodec ◀───┘
//! ```

pub mod branch;
pub mod cache;
pub mod codec;
pub mod error;
pub mod escape;
pub mod executor;
pub mod links;
pub mod manager;
pub mod mapper;
pub mod models;
pub mod query;

pub use codec::{Entity, EntityCodec, EntityKind, XmlCodec};
pub use error::{Error, Result};
pub use executor::QueryExecutor;
pub use manager::{DatabaseManager, DuplicatePolicy, InsertOutcome};
pub use query::{NodeAttribute, QueryBuilder, DEFAULT_DATABASE, TEST_DATABASE};
