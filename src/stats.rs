//! Database lifecycle and overview commands.
//!
//! `yams init`, `yams reset`, `yams optimize`, `yams databases` and
//! `yams stats`. Stats are served from the store-side cache document when
//! present; `--clear` drops it so the next call recomputes.

use anyhow::Result;
use yams_core::models::DatabaseStats;

use crate::config::Config;
use crate::db;

pub async fn run_init(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    manager.check_db_exists().await?;
    println!("Database '{}' is ready.", manager.database());
    Ok(())
}

pub async fn run_reset(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    manager.drop_all_records().await?;
    println!("Database '{}' reset.", manager.database());
    Ok(())
}

pub async fn run_optimize(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    manager.create_indexes().await?;
    println!("Indexes rebuilt for '{}'.", manager.database());
    Ok(())
}

/// List databases on the store; with `with_stats`, include each one's counts.
pub async fn run_databases(config: &Config, with_stats: bool) -> Result<()> {
    let manager = db::connect(config)?;
    if !with_stats {
        for name in manager.database_list().await? {
            println!("{}", name);
        }
        return Ok(());
    }

    let list = manager.database_stats_list().await?;
    for info in &list.databases {
        match &info.stats {
            Some(stats) => println!(
                "{:<24} {:>8} known  {:>8} missing  {:>6} roots  {:>4} icons",
                info.name,
                stats.known_documents,
                stats.missing_documents,
                stats.root_documents,
                info.icons.as_ref().map_or(0, |icons| icons.len())
            ),
            None => println!("{:<24} (no stats)", info.name),
        }
    }
    println!();
    println!("({}ms)", list.query_time_ms);
    Ok(())
}

pub async fn run_stats(config: &Config, clear: bool) -> Result<()> {
    let manager = db::connect(config)?;
    if clear {
        manager.clear_database_stats().await?;
        println!("Cached stats cleared for '{}'.", manager.database());
        return Ok(());
    }

    let stats = manager.database_stats().await?;
    print_stats(manager.database(), &stats);
    Ok(())
}

fn print_stats(database: &str, stats: &DatabaseStats) {
    println!("YAMS Database Stats");
    println!("===================");
    println!();
    println!("  Database:    {}", database);
    println!("  Known:       {}", stats.known_documents);
    println!("  Missing:     {}", stats.missing_documents);
    println!("  Duplicates:  {}", stats.duplicate_documents);
    println!("  Roots:       {}", stats.root_documents);
    println!("  Cached:      {}", if stats.cached { "yes" } else { "no" });
    println!("  Query time:  {}ms", stats.query_time_ms);

    if !stats.root_document_ids.is_empty() {
        println!();
        println!("  Root documents:");
        for id in &stats.root_document_ids {
            println!("    {}", id);
        }
    }
}
