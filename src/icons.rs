//! Record type icons: `yams icons list` and `yams icons add`.
//!
//! The store keeps one `IconTable` document per database. Adding icons
//! keeps the stored icons of every type the new ones do not cover.

use std::path::Path;

use anyhow::{bail, Context, Result};
use yams_core::models::{IconTable, NodeIcon, NodeType};

use crate::config::Config;
use crate::db;

/// Build a one-icon table from an image file for `node_type` (and `format`).
pub fn icon_from_file(node_type: &str, format: Option<&str>, image: &Path) -> Result<IconTable> {
    if node_type.trim().is_empty() {
        bail!("Icon type must not be empty.");
    }
    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read {}", image.display()))?;
    if bytes.is_empty() {
        bail!("Icon image {} is empty.", image.display());
    }
    let kind = NodeType {
        label: Some(node_type.to_string()),
        format: format.filter(|f| !f.is_empty()).map(str::to_string),
    };
    Ok(IconTable {
        icons: vec![NodeIcon::from_image(kind, &bytes)],
    })
}

pub async fn run_icons_list(config: &Config) -> Result<()> {
    let manager = db::connect(config)?;
    let icons = manager.node_icons().await?;
    print_icons(&icons);
    Ok(())
}

pub async fn run_icons_add(
    config: &Config,
    node_type: &str,
    format: Option<&str>,
    image: &Path,
) -> Result<()> {
    let table = icon_from_file(node_type, format, image)?;
    let manager = db::connect(config)?;
    let stored = manager.insert_node_icons(table).await?;
    println!("Stored icon for {}.", node_type);
    print_icons(&stored);
    Ok(())
}

fn print_icons(icons: &IconTable) {
    if icons.is_empty() {
        println!("No icons stored.");
        return;
    }
    for icon in &icons.icons {
        let size = icon
            .image_bytes()
            .map(|b| format!("{} bytes", b.len()))
            .unwrap_or_else(|_| "unreadable image".to_string());
        println!(
            "{:<24} {:<10} {}",
            icon.node_type.label.as_deref().unwrap_or("(no type)"),
            icon.node_type.format.as_deref().unwrap_or("-"),
            size
        );
    }
    println!("{} icon(s)", icons.len());
}
