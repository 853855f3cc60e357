//! Crawler-side commands.
//!
//! `yams links next|merge|counts` drive the link partition, `yams insert`
//! stores a crawled record and `yams delete-branch` removes a record with
//! everything reachable below it. Record and link files are read in the
//! same XML shape the store keeps them in.

use std::path::Path;

use anyhow::{bail, Context, Result};
use yams_core::models::{DocumentId, DocumentNode, LinkSet, NodeLink};
use yams_core::{DuplicatePolicy, Entity, EntityCodec, EntityKind, InsertOutcome, XmlCodec};

use crate::config::Config;
use crate::db;

fn read_entity(path: &Path, kind: EntityKind) -> Result<Entity> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    XmlCodec
        .decode(&raw, kind)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn read_link_set(path: &Path) -> Result<LinkSet> {
    match read_entity(path, EntityKind::LinkSet)? {
        Entity::LinkSet(links) => Ok(links),
        other => bail!("Expected a link set, got {}", other.kind().name()),
    }
}

pub fn read_node(path: &Path) -> Result<DocumentNode> {
    match read_entity(path, EntityKind::DocumentNode)? {
        Entity::DocumentNode(node) => Ok(node),
        other => bail!("Expected a record, got {}", other.kind().name()),
    }
}

pub async fn run_links_next(config: &Config, limit: Option<usize>, filter: Option<String>) -> Result<()> {
    let limit = limit.unwrap_or(config.crawler.batch_size);
    let filter = filter.or_else(|| config.crawler.filter.clone());
    let manager = db::connect(config)?;
    let links = manager.next_missing(limit, filter.as_deref()).await?;
    print_links(&links);
    Ok(())
}

/// Merge a crawler batch file, then print the next links to fetch.
pub async fn run_links_merge(config: &Config, file: &Path) -> Result<()> {
    let batch = read_link_set(file)?;
    let manager = db::connect(config)?;
    let links = manager
        .missing_links(
            &batch,
            config.crawler.batch_size,
            config.crawler.filter.as_deref(),
        )
        .await?;
    println!(
        "Merged {} root, {} recent, {} missing link(s).",
        batch.root_links.len(),
        batch.recent_links.len(),
        batch.missing_links.len()
    );
    println!();
    print_links(&links);
    Ok(())
}

pub async fn run_links_counts(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    let counts = manager.link_counts().await?;
    println!("  Missing:    {}", counts.missing);
    println!("  Recent:     {}", counts.recent);
    println!("  Documents:  {}", counts.documents);
    Ok(())
}

pub async fn run_insert(config: &Config, file: &Path, fail_on_duplicate: bool) -> Result<()> {
    let node = read_node(file)?;
    let policy = if fail_on_duplicate {
        DuplicatePolicy::Fail
    } else {
        config.query.duplicate_policy()
    };
    let manager = db::connect(config)?;
    match manager.insert_node(&node, policy).await? {
        InsertOutcome::Inserted => println!("Inserted {}", node.id),
        InsertOutcome::SkippedDuplicate => println!("Skipped {} (already stored)", node.id),
    }
    Ok(())
}

pub async fn run_delete_branch(config: &Config, id: &str) -> Result<()> {
    let manager = db::connect(config)?;
    let deleted = manager.delete_branch(&DocumentId::new(id)).await?;
    if deleted == 0 {
        println!("No records under {}.", id);
    } else {
        println!("Deleted {} record(s) under {}.", deleted, id);
    }
    Ok(())
}

fn print_links(links: &[NodeLink]) {
    if links.is_empty() {
        println!("No missing links.");
        return;
    }
    for link in links {
        println!("{}  {}", link.id, link.uri.as_deref().unwrap_or(""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_link_set_file() {
        let file = write_file(
            "<DatabaseLinks>\
             <RootDocumentLinks ID=\"r\" URI=\"http://a/r.cmdi\"/>\
             <MissingDocumentLinks ID=\"m\" URI=\"http://a/m.cmdi\"/>\
             </DatabaseLinks>",
        );
        let links = read_link_set(file.path()).unwrap();
        assert_eq!(links.root_links, vec![NodeLink::new("r", "http://a/r.cmdi")]);
        assert_eq!(links.missing_links.len(), 1);
        assert!(links.recent_links.is_empty());
    }

    #[test]
    fn test_read_node_file() {
        let file = write_file("<DataNode ID=\"n1\" Label=\"Session 1\" URI=\"http://a/n1.cmdi\"/>");
        let node = read_node(file.path()).unwrap();
        assert_eq!(node.id.as_str(), "n1");
        assert_eq!(node.label.as_deref(), Some("Session 1"));
    }

    #[test]
    fn test_read_empty_or_missing_is_error() {
        let file = write_file("   ");
        assert!(read_node(file.path()).is_err());
        assert!(read_link_set(Path::new("/nonexistent/links.xml")).is_err());
    }
}
