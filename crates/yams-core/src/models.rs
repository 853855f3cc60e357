//! Data shapes exchanged with the document store.
//!
//! The serde attributes carry the element and attribute names used by the
//! stored XML documents; `@`-prefixed names are XML attributes. These names
//! are part of the storage format and must not change.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque, globally unique identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A crawled metadata record.
///
/// Inserted once under `CrawledData/{id}` and never updated in place; a
/// changed record is removed with a branch delete and fetched again.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DataNode")]
pub struct DocumentNode {
    #[serde(rename = "@ID")]
    pub id: DocumentId,
    #[serde(rename = "@Label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "@ArchiveHandle", default, skip_serializing_if = "Option::is_none")]
    pub archive_handle: Option<String>,
    #[serde(rename = "@URI", default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(rename = "FieldGroup", default)]
    pub field_groups: Vec<FieldGroup>,
    #[serde(rename = "ChildLink", default)]
    pub child_links: Vec<NodeLink>,
}

impl DocumentNode {
    pub fn type_label(&self) -> Option<&str> {
        self.node_type.as_ref().and_then(|t| t.label.as_deref())
    }
}

/// Record type: a label plus the metadata format it was parsed from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeType {
    #[serde(rename = "@Label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "@Format", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldGroup {
    #[serde(rename = "@Label")]
    pub label: String,
    #[serde(rename = "FieldData", default)]
    pub fields: Vec<FieldData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldData {
    #[serde(rename = "@Path")]
    pub path: String,
    #[serde(rename = "@FieldValue")]
    pub value: String,
}

/// A reference to another record, used both for a record's children and
/// for the entries of the crawler's [`LinkSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeLink {
    #[serde(rename = "@ID")]
    pub id: DocumentId,
    #[serde(rename = "@URI", default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl NodeLink {
    pub fn new(id: impl Into<DocumentId>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: Some(uri.into()),
        }
    }
}

/// The crawler's three-way partition of known identifiers.
///
/// Stored as the single `DatabaseLinks` document of a database. An id is in
/// at most one of the three lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DatabaseLinks")]
pub struct LinkSet {
    /// Entry points not known to be the child of any stored record.
    #[serde(rename = "RootDocumentLinks", default)]
    pub root_links: Vec<NodeLink>,
    /// Referenced but not fetched yet.
    #[serde(rename = "MissingDocumentLinks", default)]
    pub missing_links: Vec<NodeLink>,
    /// Fetched during the current crawl pass.
    #[serde(rename = "RecentDocumentLinks", default)]
    pub recent_links: Vec<NodeLink>,
}

impl LinkSet {
    pub fn is_empty(&self) -> bool {
        self.root_links.is_empty() && self.missing_links.is_empty() && self.recent_links.is_empty()
    }

    /// Drop repeated ids and resolve overlaps inside one crawler batch.
    ///
    /// Precedence is root, then recent, then missing: an id fetched in this
    /// pass is not also reported missing, and a root candidate stays a root.
    pub fn normalized(&self) -> LinkSet {
        use std::collections::HashSet;

        fn unseen<'a>(links: &'a [NodeLink], seen: &mut HashSet<&'a DocumentId>) -> Vec<NodeLink> {
            let mut kept = Vec::new();
            for link in links {
                if seen.insert(&link.id) {
                    kept.push(link.clone());
                }
            }
            kept
        }

        let mut seen = HashSet::new();
        let root_links = unseen(&self.root_links, &mut seen);
        let recent_links = unseen(&self.recent_links, &mut seen);
        let missing_links = unseen(&self.missing_links, &mut seen);
        LinkSet {
            root_links,
            missing_links,
            recent_links,
        }
    }
}

/// A facet descriptor, also used as the type/path/value filter of facet
/// and search queries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "MetadataFileType")]
pub struct FacetType {
    #[serde(rename = "Label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(rename = "Path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "Count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(rename = "MetadataFileType", default)]
    pub children: Vec<FacetType>,
}

impl FacetType {
    /// A filter on record type only.
    pub fn of_type(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A node of the nested facet browse tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "TreeNode")]
pub struct FacetTreeNode {
    #[serde(rename = "DisplayString", default)]
    pub display: String,
    #[serde(rename = "TreeNode", default)]
    pub children: Vec<FacetTreeNode>,
    #[serde(rename = "MetadataTreeNode", default)]
    pub matches: Vec<MatchLocation>,
}

/// Where a record matching every facet selection of a tree branch lives.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchLocation {
    #[serde(rename = "FileUri", default)]
    pub file_uri: String,
    #[serde(rename = "NodeId", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<DocumentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negator {
    Is,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    Equals,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Intersect,
    Union,
}

impl fmt::Display for Negator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Negator::Is => "is",
            Negator::Not => "not",
        })
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchMode::Contains => "contains",
            MatchMode::Equals => "equals",
            MatchMode::Fuzzy => "fuzzy",
        })
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Intersect => "intersect",
            JoinType::Union => "union",
        })
    }
}

/// One line of a search form.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriterion {
    /// Record type and field-group path the criterion is restricted to.
    pub file_type: FacetType,
    pub negator: Negator,
    pub match_mode: MatchMode,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchRequest {
    pub criteria: Vec<SearchCriterion>,
    pub join: JoinType,
}

/// Search output: the surviving ids plus which field paths matched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DataNode")]
pub struct SearchResults {
    #[serde(rename = "@ID", default)]
    pub id: String,
    #[serde(rename = "@Label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "Highlight", default)]
    pub highlights: Vec<Highlight>,
    #[serde(rename = "ChildLink", default)]
    pub matches: Vec<NodeLink>,
}

impl SearchResults {
    pub fn matched_ids(&self) -> Vec<&DocumentId> {
        self.matches.iter().map(|l| &l.id).collect()
    }

    pub fn highlighted_paths(&self, id: &DocumentId) -> Vec<&str> {
        self.highlights
            .iter()
            .filter(|h| &h.id == id)
            .filter_map(|h| h.path.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(rename = "@ID")]
    pub id: DocumentId,
    #[serde(rename = "@Path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Aggregate counts over one database.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DatabaseStats")]
pub struct DatabaseStats {
    #[serde(rename = "KnownDocuments", default)]
    pub known_documents: u64,
    #[serde(rename = "MissingDocuments", default)]
    pub missing_documents: u64,
    #[serde(rename = "DuplicateDocuments", default)]
    pub duplicate_documents: u64,
    #[serde(rename = "RootDocuments", default)]
    pub root_documents: u64,
    #[serde(rename = "Cached", default)]
    pub cached: bool,
    #[serde(rename = "RootDocumentID", default)]
    pub root_document_ids: Vec<DocumentId>,
    #[serde(skip)]
    pub query_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DatabaseList")]
pub struct DatabaseList {
    #[serde(rename = "DatabaseInfo", default)]
    pub databases: Vec<DatabaseInfo>,
    #[serde(skip)]
    pub query_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "DatabaseName")]
    pub name: String,
    #[serde(rename = "DatabaseStats", default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DatabaseStats>,
    #[serde(rename = "IconTable", default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<IconTable>,
}

/// Display icon for one record type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeIcon {
    #[serde(rename = "Type")]
    pub node_type: NodeType,
    /// Image bytes, base64-encoded as stored.
    #[serde(rename = "Image", default)]
    pub image: String,
}

impl NodeIcon {
    pub fn from_image(node_type: NodeType, image: &[u8]) -> Self {
        Self {
            node_type,
            image: STANDARD.encode(image),
        }
    }

    pub fn image_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.image.trim())
            .map_err(|e| Error::decode("node icon", e))
    }
}

/// Every record type with a known icon, stored as one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "IconTable")]
pub struct IconTable {
    #[serde(rename = "NodeTypeImage", default)]
    pub icons: Vec<NodeIcon>,
}

impl IconTable {
    pub fn icon_for(&self, node_type: &NodeType) -> Option<&NodeIcon> {
        self.icons.iter().find(|icon| &icon.node_type == node_type)
    }

    /// First icon whose type carries `label`, whatever its format.
    pub fn icon_for_label(&self, label: &str) -> Option<&NodeIcon> {
        self.icons
            .iter()
            .find(|icon| icon.node_type.label.as_deref() == Some(label))
    }

    /// Add `icon` unless its type already has one; true when added.
    pub fn add_type_icon(&mut self, icon: NodeIcon) -> bool {
        if self.icon_for(&icon.node_type).is_some() {
            return false;
        }
        self.icons.push(icon);
        true
    }

    /// Fold in the icons of `other` for types this table does not cover.
    pub fn merge_missing(&mut self, other: IconTable) {
        for icon in other.icons {
            self.add_type_icon(icon);
        }
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

/// One breadth-first level of a client-side branch traversal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "BranchLevel")]
pub struct BranchLevel {
    #[serde(rename = "Node", default)]
    pub nodes: Vec<BranchEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchEntry {
    #[serde(rename = "@ID")]
    pub id: DocumentId,
    #[serde(rename = "Child", default)]
    pub children: Vec<BranchChild>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchChild {
    #[serde(rename = "@ID")]
    pub id: DocumentId,
}

/// Sizes of the link partition next to the stored record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkCounts {
    pub missing: u64,
    pub recent: u64,
    pub documents: u64,
}
