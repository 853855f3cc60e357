//! Facet commands: `yams types`, `yams paths`, `yams values`,
//! `yams tree-types` and `yams tree`.

use anyhow::{bail, Result};
use yams_core::models::{FacetTreeNode, FacetType};

use crate::config::Config;
use crate::db;

/// The type/path/value filter given on the command line, if any.
pub fn facet_filter(
    node_type: Option<String>,
    path: Option<String>,
    value: Option<String>,
) -> Option<FacetType> {
    if node_type.is_none() && path.is_none() && value.is_none() {
        return None;
    }
    Some(FacetType {
        node_type,
        path,
        value,
        ..Default::default()
    })
}

/// Parse a `type:path` tree filter; the path part is optional.
pub fn parse_tree_filter(spec: &str) -> Result<FacetType> {
    let (node_type, path) = match spec.split_once(':') {
        Some((t, p)) => (t, Some(p)),
        None => (spec, None),
    };
    if node_type.is_empty() {
        bail!("Invalid tree filter '{}'. Expected type or type:path.", spec);
    }
    let mut filter = FacetType::of_type(node_type);
    if let Some(path) = path.filter(|p| !p.is_empty()) {
        filter = filter.with_path(path);
    }
    Ok(filter)
}

pub async fn run_types(config: &Config, filter: Option<FacetType>) -> Result<()> {
    let manager = db::connect(config)?;
    let types = manager.metadata_types(filter.as_ref()).await?;
    print_facets(&types);
    Ok(())
}

pub async fn run_paths(config: &Config, filter: Option<FacetType>) -> Result<()> {
    let manager = db::connect(config)?;
    let paths = manager.metadata_paths(filter.as_ref()).await?;
    print_facets(&paths);
    Ok(())
}

pub async fn run_values(config: &Config, filter: Option<FacetType>, max: Option<usize>) -> Result<()> {
    let max = max.unwrap_or(config.query.max_field_values);
    let manager = db::connect(config)?;
    let values = manager.field_values(filter.as_ref(), max).await?;
    print_facets(&values);
    Ok(())
}

pub async fn run_tree_types(config: &Config, filters: &[String]) -> Result<()> {
    let filters = filters
        .iter()
        .map(|f| parse_tree_filter(f))
        .collect::<Result<Vec<_>>>()?;
    let manager = db::connect(config)?;
    let types = manager.tree_facet_types(&filters).await?;
    print_facets(&types);
    Ok(())
}

pub async fn run_tree(config: &Config, node_type: Option<String>, labels: &[String]) -> Result<()> {
    let filter = node_type.map(FacetType::of_type);
    let manager = db::connect(config)?;
    let tree = manager.facet_tree(filter.as_ref(), labels).await?;
    print_tree(&tree, 0);
    Ok(())
}

fn print_facets(facets: &[FacetType]) {
    if facets.is_empty() {
        println!("No facets found.");
        return;
    }
    for facet in facets {
        let name = facet
            .value
            .as_deref()
            .or(facet.path.as_deref())
            .or(facet.node_type.as_deref())
            .or(facet.label.as_deref())
            .unwrap_or("(unnamed)");
        match facet.count {
            Some(count) => println!("{:>8}  {}", count, name),
            None => println!("{:>8}  {}", "-", name),
        }
    }
}

fn print_tree(node: &FacetTreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if !node.display.is_empty() {
        println!("{}{}", indent, node.display);
    }
    for location in &node.matches {
        match &location.node_id {
            Some(id) => println!("{}  - {} ({})", indent, location.file_uri, id),
            None => println!("{}  - {}", indent, location.file_uri),
        }
    }
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}
