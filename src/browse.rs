//! Record browsing: `yams roots`, `yams children` and `yams nodes`.

use anyhow::{bail, Result};
use yams_core::models::{DocumentId, DocumentNode};
use yams_core::NodeAttribute;

use crate::config::Config;
use crate::db;

/// Map the `--by` flag onto the record attribute it selects.
pub fn parse_attribute(by: &str) -> Result<NodeAttribute> {
    match by {
        "id" => Ok(NodeAttribute::Id),
        "handle" => Ok(NodeAttribute::ArchiveHandle),
        "uri" => Ok(NodeAttribute::Uri),
        other => bail!("Unknown attribute '{}'. Use id, handle or uri.", other),
    }
}

/// Last position of a child page; without `--end` the page holds
/// `page_size` children, capped at `usize::MAX`.
pub fn page_end(start: usize, end: Option<usize>, page_size: usize) -> usize {
    end.unwrap_or_else(|| start.saturating_add(page_size))
}

pub async fn run_roots(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    let nodes = manager.root_nodes().await?;
    print_nodes(&nodes);
    Ok(())
}

/// Print one page of children; `end` defaults to `start + query.page_size`.
pub async fn run_children(
    config: &Config,
    value: &str,
    by: &str,
    start: usize,
    end: Option<usize>,
) -> Result<()> {
    let attribute = parse_attribute(by)?;
    let end = page_end(start, end, config.query.page_size);
    let manager = db::connect(config)?;
    let nodes = manager.child_nodes(attribute, value, start, end).await?;
    print_nodes(&nodes);
    Ok(())
}

pub async fn run_nodes(config: &Config, values: &[String], by: &str) -> Result<()> {
    let attribute = parse_attribute(by)?;
    let manager = db::connect(config)?;
    let nodes = match attribute {
        NodeAttribute::Id => {
            let ids: Vec<DocumentId> = values.iter().map(|v| DocumentId::new(v.as_str())).collect();
            manager.nodes_by_ids(&ids).await?
        }
        NodeAttribute::ArchiveHandle => manager.nodes_by_handles(values).await?,
        NodeAttribute::Uri => manager.nodes_by_uris(values).await?,
    };
    print_nodes(&nodes);
    Ok(())
}

pub(crate) fn print_nodes(nodes: &[DocumentNode]) {
    if nodes.is_empty() {
        println!("No records found.");
        return;
    }
    for node in nodes {
        print_node(node);
    }
    println!("{} record(s)", nodes.len());
}

fn print_node(node: &DocumentNode) {
    println!(
        "{}  {}",
        node.id,
        node.label.as_deref().unwrap_or("(no label)")
    );
    if let Some(kind) = node.type_label() {
        println!("    type:     {}", kind);
    }
    if let Some(uri) = &node.uri {
        println!("    uri:      {}", uri);
    }
    if let Some(handle) = &node.archive_handle {
        println!("    handle:   {}", handle);
    }
    if !node.child_links.is_empty() {
        println!("    children: {}", node.child_links.len());
    }
}
