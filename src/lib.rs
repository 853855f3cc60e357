//! # YAMS
//!
//! Command-line access to a YAMS metadata store: browse crawled archive
//! records, aggregate facets, run field searches and drive the crawler's
//! link state against a BaseX-style REST store.
//!
//! The engine itself lives in the `yams-core` crate; this package adds the
//! REST binding, configuration, logging and the `yams` binary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────┐   ┌──────────────┐   ┌─────────┐
//! │   CLI    │──▶│ DatabaseManager │──▶│ RestExecutor │──▶│  Store  │
//! │  (yams)  │   │   (yams-core)   │   │   (reqwest)  │   │ (REST)  │
//! └──────────┘   └─────────────────┘   └──────────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! yams init                         # create the database if missing
//! yams stats                        # cached record counts
//! yams types                        # record types with counts
//! yams search --criterion "Session|.METATRANSCRIPT.Session.Name|is|contains|kleve"
//! yams links next --limit 20        # links the crawler should fetch next
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`rest`] | REST implementation of the store executor |
//! | [`db`] | Store connection |
//! | [`stats`] | Database lifecycle and stats commands |
//! | [`browse`] | Record browsing commands |
//! | [`facets`] | Facet aggregate commands |
//! | [`search`] | Field search command |
//! | [`crawl`] | Link state, insert and branch delete commands |
//! | [`icons`] | Record type icon commands |

pub mod browse;
pub mod config;
pub mod crawl;
pub mod db;
pub mod facets;
pub mod icons;
pub mod logging;
pub mod rest;
pub mod search;
pub mod stats;
