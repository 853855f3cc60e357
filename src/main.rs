//! # YAMS CLI (`yams`)
//!
//! ## Usage
//!
//! ```bash
//! yams --config ./config/yams.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `yams init` | Create the database if the store lacks it |
//! | `yams reset` | Drop every record, cache and link document |
//! | `yams optimize` | Rebuild the store's indexes |
//! | `yams databases` | List databases on the store |
//! | `yams stats` | Record counts (cached) |
//! | `yams types` / `paths` / `values` | Facet aggregates |
//! | `yams tree-types` / `tree` | Facet browse tree |
//! | `yams roots` / `children` / `nodes` | Record browsing |
//! | `yams search` | Field search |
//! | `yams links next` / `merge` / `counts` | Crawler link state |
//! | `yams insert <file>` | Store a crawled record |
//! | `yams delete-branch <id>` | Delete a record and everything below it |
//! | `yams icons list` / `add` | Record type icons |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use yams::{browse, config, crawl, facets, icons, logging, search, stats};

/// YAMS CLI: query and maintain a crawled metadata store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/yams.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "yams",
    about = "YAMS: browse, search and crawl-state tooling for an archive metadata store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/yams.toml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if the store does not have it.
    Init,

    /// Drop and recreate the database.
    ///
    /// Removes every record together with cached aggregates and the
    /// crawler's link state.
    Reset,

    /// Rebuild the store's indexes for the database.
    Optimize,

    /// List databases on the store.
    Databases {
        /// Include each database's record counts.
        #[arg(long = "stats")]
        with_stats: bool,
    },

    /// Show record counts for the database.
    ///
    /// Counts are cached in the store after the first call.
    Stats {
        /// Drop the cached counts instead of printing them.
        #[arg(long)]
        clear: bool,
    },

    /// Record types with counts.
    Types {
        #[command(flatten)]
        filter: FacetArgs,
    },

    /// Field paths with counts.
    Paths {
        #[command(flatten)]
        filter: FacetArgs,
    },

    /// Distinct field values with counts.
    Values {
        #[command(flatten)]
        filter: FacetArgs,

        /// Maximum number of values (default: query.max_field_values).
        #[arg(long)]
        max: Option<usize>,
    },

    /// Facet candidates for building a browse tree.
    TreeTypes {
        /// `type` or `type:path` filter; repeatable.
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Nested facet browse tree.
    Tree {
        /// Restrict to records of this type.
        #[arg(long = "type")]
        node_type: Option<String>,

        /// Field-group label for each tree level, outermost first.
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Records that are nobody's child.
    Roots,

    /// One page of a record's children.
    Children {
        /// Id, handle or URI of the parent record.
        value: String,

        /// Attribute the value is matched against: id, handle or uri.
        #[arg(long, default_value = "id")]
        by: String,

        /// Skip this many children.
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last child position (default: start + query.page_size).
        #[arg(long)]
        end: Option<usize>,
    },

    /// Records by id, handle or URI.
    Nodes {
        #[arg(required = true)]
        values: Vec<String>,

        /// Attribute the values are matched against: id, handle or uri.
        #[arg(long, default_value = "id")]
        by: String,
    },

    /// Search record fields.
    Search {
        /// `type|path|is|contains|text`; repeatable.
        #[arg(long = "criterion", required = true)]
        criteria: Vec<String>,

        /// How `is` criteria combine: intersect or union.
        #[arg(long, default_value = "intersect")]
        join: String,
    },

    /// Crawler link state.
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },

    /// Store a crawled record from an XML file.
    Insert {
        file: PathBuf,

        /// Fail instead of skipping when the id is already stored.
        #[arg(long)]
        fail_on_duplicate: bool,
    },

    /// Delete a record and every record reachable through its children.
    DeleteBranch { id: String },

    /// Display icons per record type.
    Icons {
        #[command(subcommand)]
        action: IconsAction,
    },
}

#[derive(clap::Args)]
struct FacetArgs {
    /// Record type filter.
    #[arg(long = "type")]
    node_type: Option<String>,

    /// Field path filter.
    #[arg(long)]
    path: Option<String>,

    /// Field value filter.
    #[arg(long)]
    value: Option<String>,
}

impl FacetArgs {
    fn into_filter(self) -> Option<yams_core::models::FacetType> {
        facets::facet_filter(self.node_type, self.path, self.value)
    }
}

#[derive(Subcommand)]
enum LinksAction {
    /// Links the crawler should fetch next.
    Next {
        /// Maximum number of links (default: crawler.batch_size).
        #[arg(long)]
        limit: Option<usize>,

        /// Only links whose URI contains this text.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Merge a crawler batch (a DatabaseLinks XML file) and print the next links.
    Merge { file: PathBuf },

    /// Sizes of the link partition.
    Counts,
}

#[derive(Subcommand)]
enum IconsAction {
    /// Stored icons.
    List,

    /// Store an image as the icon of a record type.
    ///
    /// Icons already stored for other types are kept.
    Add {
        image: PathBuf,

        /// Record type the icon is shown for.
        #[arg(long = "type")]
        node_type: String,

        /// Metadata format of the record type.
        #[arg(long)]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => stats::run_init(&cfg).await?,
        Commands::Reset => stats::run_reset(&cfg).await?,
        Commands::Optimize => stats::run_optimize(&cfg).await?,
        Commands::Databases { with_stats } => stats::run_databases(&cfg, with_stats).await?,
        Commands::Stats { clear } => stats::run_stats(&cfg, clear).await?,
        Commands::Types { filter } => facets::run_types(&cfg, filter.into_filter()).await?,
        Commands::Paths { filter } => facets::run_paths(&cfg, filter.into_filter()).await?,
        Commands::Values { filter, max } => {
            facets::run_values(&cfg, filter.into_filter(), max).await?
        }
        Commands::TreeTypes { filters } => facets::run_tree_types(&cfg, &filters).await?,
        Commands::Tree { node_type, labels } => facets::run_tree(&cfg, node_type, &labels).await?,
        Commands::Roots => browse::run_roots(&cfg).await?,
        Commands::Children {
            value,
            by,
            start,
            end,
        } => browse::run_children(&cfg, &value, &by, start, end).await?,
        Commands::Nodes { values, by } => browse::run_nodes(&cfg, &values, &by).await?,
        Commands::Search { criteria, join } => search::run_search(&cfg, &criteria, &join).await?,
        Commands::Links { action } => match action {
            LinksAction::Next { limit, filter } => {
                crawl::run_links_next(&cfg, limit, filter).await?
            }
            LinksAction::Merge { file } => crawl::run_links_merge(&cfg, &file).await?,
            LinksAction::Counts => crawl::run_links_counts(&cfg).await?,
        },
        Commands::Insert {
            file,
            fail_on_duplicate,
        } => crawl::run_insert(&cfg, &file, fail_on_duplicate).await?,
        Commands::DeleteBranch { id } => crawl::run_delete_branch(&cfg, &id).await?,
        Commands::Icons { action } => match action {
            IconsAction::List => icons::run_icons_list(&cfg).await?,
            IconsAction::Add {
                image,
                node_type,
                format,
            } => icons::run_icons_add(&cfg, &node_type, format.as_deref(), &image).await?,
        },
    }

    Ok(())
}
