//! Entity (de)serialization.
//!
//! The engine works with a closed set of result shapes, named by
//! [`EntityKind`]. An [`EntityCodec`] turns raw store output into the
//! matching [`Entity`] and back. [`XmlCodec`] is the XML implementation
//! built on `quick-xml`'s serde support.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    BranchLevel, DatabaseList, DatabaseStats, DocumentNode, FacetTreeNode, FacetType, IconTable,
    LinkSet, SearchResults,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    DocumentNode,
    DocumentNodes,
    SearchResults,
    FacetTypes,
    FacetTree,
    LinkSet,
    DatabaseStats,
    DatabaseList,
    BranchLevel,
    IconTable,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::DocumentNode => "document node",
            EntityKind::DocumentNodes => "document node list",
            EntityKind::SearchResults => "search results",
            EntityKind::FacetTypes => "facet types",
            EntityKind::FacetTree => "facet tree",
            EntityKind::LinkSet => "link set",
            EntityKind::DatabaseStats => "database stats",
            EntityKind::DatabaseList => "database list",
            EntityKind::BranchLevel => "branch level",
            EntityKind::IconTable => "icon table",
        }
    }

    /// Kinds for which an empty response means "no entities".
    fn empty_is_valid(&self) -> bool {
        matches!(
            self,
            EntityKind::DocumentNodes
                | EntityKind::FacetTypes
                | EntityKind::BranchLevel
                | EntityKind::IconTable
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    DocumentNode(DocumentNode),
    DocumentNodes(Vec<DocumentNode>),
    SearchResults(SearchResults),
    FacetTypes(Vec<FacetType>),
    FacetTree(FacetTreeNode),
    LinkSet(LinkSet),
    DatabaseStats(DatabaseStats),
    DatabaseList(DatabaseList),
    BranchLevel(BranchLevel),
    IconTable(IconTable),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::DocumentNode(_) => EntityKind::DocumentNode,
            Entity::DocumentNodes(_) => EntityKind::DocumentNodes,
            Entity::SearchResults(_) => EntityKind::SearchResults,
            Entity::FacetTypes(_) => EntityKind::FacetTypes,
            Entity::FacetTree(_) => EntityKind::FacetTree,
            Entity::LinkSet(_) => EntityKind::LinkSet,
            Entity::DatabaseStats(_) => EntityKind::DatabaseStats,
            Entity::DatabaseList(_) => EntityKind::DatabaseList,
            Entity::BranchLevel(_) => EntityKind::BranchLevel,
            Entity::IconTable(_) => EntityKind::IconTable,
        }
    }

    /// Number of top-level entities carried, for timing logs.
    pub fn len(&self) -> usize {
        match self {
            Entity::DocumentNodes(nodes) => nodes.len(),
            Entity::SearchResults(results) => results.matches.len(),
            Entity::FacetTypes(types) => types.len(),
            Entity::LinkSet(links) => {
                links.root_links.len() + links.missing_links.len() + links.recent_links.len()
            }
            Entity::DatabaseList(list) => list.databases.len(),
            Entity::BranchLevel(level) => level.nodes.len(),
            Entity::IconTable(icons) => icons.len(),
            Entity::DocumentNode(_) | Entity::FacetTree(_) | Entity::DatabaseStats(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts raw store output to typed entities and back.
pub trait EntityCodec: Send + Sync {
    fn decode(&self, raw: &str, kind: EntityKind) -> Result<Entity>;

    fn encode(&self, entity: &Entity) -> Result<String>;
}

/// A `<DataNode>` wrapper around a list of records.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "DataNode")]
struct NodeList {
    #[serde(rename = "DataNode", default)]
    nodes: Vec<DocumentNode>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> Self {
        Self
    }
}

fn from_xml<T>(raw: &str, kind: EntityKind) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    quick_xml::de::from_str(raw).map_err(|e| Error::decode(kind.name(), e))
}

fn to_xml<T: Serialize>(value: &T, kind: EntityKind) -> Result<String> {
    quick_xml::se::to_string(value).map_err(|e| Error::decode(kind.name(), e))
}

impl EntityCodec for XmlCodec {
    fn decode(&self, raw: &str, kind: EntityKind) -> Result<Entity> {
        let raw = raw.trim();
        if raw.is_empty() {
            if kind.empty_is_valid() {
                return Ok(match kind {
                    EntityKind::DocumentNodes => Entity::DocumentNodes(Vec::new()),
                    EntityKind::FacetTypes => Entity::FacetTypes(Vec::new()),
                    EntityKind::IconTable => Entity::IconTable(IconTable::default()),
                    _ => Entity::BranchLevel(BranchLevel::default()),
                });
            }
            return Err(Error::decode(kind.name(), "empty response"));
        }
        Ok(match kind {
            EntityKind::DocumentNode => Entity::DocumentNode(from_xml(raw, kind)?),
            EntityKind::DocumentNodes => {
                Entity::DocumentNodes(from_xml::<NodeList>(raw, kind)?.nodes)
            }
            EntityKind::SearchResults => Entity::SearchResults(from_xml(raw, kind)?),
            EntityKind::FacetTypes => {
                Entity::FacetTypes(from_xml::<FacetType>(raw, kind)?.children)
            }
            EntityKind::FacetTree => Entity::FacetTree(from_xml(raw, kind)?),
            EntityKind::LinkSet => Entity::LinkSet(from_xml(raw, kind)?),
            EntityKind::DatabaseStats => Entity::DatabaseStats(from_xml(raw, kind)?),
            EntityKind::DatabaseList => Entity::DatabaseList(from_xml(raw, kind)?),
            EntityKind::BranchLevel => Entity::BranchLevel(from_xml(raw, kind)?),
            EntityKind::IconTable => Entity::IconTable(from_xml(raw, kind)?),
        })
    }

    fn encode(&self, entity: &Entity) -> Result<String> {
        let kind = entity.kind();
        match entity {
            Entity::DocumentNode(node) => to_xml(node, kind),
            Entity::DocumentNodes(nodes) => to_xml(
                &NodeList {
                    nodes: nodes.clone(),
                },
                kind,
            ),
            Entity::SearchResults(results) => to_xml(results, kind),
            Entity::FacetTypes(types) => to_xml(
                &FacetType {
                    children: types.clone(),
                    ..Default::default()
                },
                kind,
            ),
            Entity::FacetTree(tree) => to_xml(tree, kind),
            Entity::LinkSet(links) => to_xml(links, kind),
            Entity::DatabaseStats(stats) => to_xml(stats, kind),
            Entity::DatabaseList(list) => to_xml(list, kind),
            Entity::BranchLevel(level) => to_xml(level, kind),
            Entity::IconTable(icons) => to_xml(icons, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentId, NodeLink};

    const SESSION: &str = r#"<DataNode ID="node:1" Label="Session one" ArchiveHandle="hdl:1839/00-0001" URI="http://a/s1.imdi">
  <Type Label="Session" Format="imdi"/>
  <FieldGroup Label="Session.Name">
    <FieldData Path=".METATRANSCRIPT.Session.Name" FieldValue="s1"/>
  </FieldGroup>
  <FieldGroup Label="Session.Title">
    <FieldData Path=".METATRANSCRIPT.Session.Title" FieldValue="First &amp; only"/>
  </FieldGroup>
  <ChildLink ID="node:2" URI="http://a/w.wav"/>
</DataNode>"#;

    #[test]
    fn test_decode_document_node() {
        let entity = XmlCodec.decode(SESSION, EntityKind::DocumentNode).unwrap();
        let Entity::DocumentNode(node) = entity else {
            panic!("wrong entity kind");
        };
        assert_eq!(node.id, DocumentId::from("node:1"));
        assert_eq!(node.type_label(), Some("Session"));
        assert_eq!(node.field_groups.len(), 2);
        assert_eq!(node.field_groups[1].fields[0].value, "First & only");
        assert_eq!(node.child_links, vec![NodeLink::new("node:2", "http://a/w.wav")]);
    }

    #[test]
    fn test_decode_node_list_wrapper() {
        let raw = format!("<DataNode>{}{}</DataNode>", SESSION, SESSION.replace("node:1", "node:3"));
        let Entity::DocumentNodes(nodes) = XmlCodec.decode(&raw, EntityKind::DocumentNodes).unwrap() else {
            panic!("wrong entity kind");
        };
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["node:1", "node:3"]);
    }

    #[test]
    fn test_decode_empty_list_response() {
        assert_eq!(
            XmlCodec.decode("  \n", EntityKind::DocumentNodes).unwrap(),
            Entity::DocumentNodes(Vec::new())
        );
        assert!(matches!(
            XmlCodec.decode("", EntityKind::DatabaseStats),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_stats() {
        let raw = "<DatabaseStats><KnownDocuments>3</KnownDocuments><MissingDocuments>1</MissingDocuments>\
                   <DuplicateDocuments>0</DuplicateDocuments><RootDocuments>1</RootDocuments>\
                   <Cached>true</Cached><RootDocumentID>A</RootDocumentID></DatabaseStats>";
        let Entity::DatabaseStats(stats) = XmlCodec.decode(raw, EntityKind::DatabaseStats).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(stats.known_documents, 3);
        assert_eq!(stats.missing_documents, 1);
        assert!(stats.cached);
        assert_eq!(stats.root_document_ids, vec![DocumentId::from("A")]);
    }

    #[test]
    fn test_decode_facet_types_unwraps_children() {
        let raw = "<MetadataFileType>\
                   <MetadataFileType><Label>All Types</Label><Count>4</Count></MetadataFileType>\
                   <MetadataFileType><Label>Session</Label><Type>Session</Type><Count>3</Count></MetadataFileType>\
                   </MetadataFileType>";
        let Entity::FacetTypes(types) = XmlCodec.decode(raw, EntityKind::FacetTypes).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].label.as_deref(), Some("All Types"));
        assert_eq!(types[1].node_type.as_deref(), Some("Session"));
        assert_eq!(types[1].count, Some(3));
    }

    #[test]
    fn test_decode_link_set() {
        let raw = r#"<DatabaseLinks>
  <RootDocumentLinks ID="A" URI="http://a/a.imdi"/>
  <MissingDocumentLinks ID="B" URI="http://a/b.imdi"/>
  <MissingDocumentLinks ID="C" URI="http://a/c.imdi"/>
</DatabaseLinks>"#;
        let Entity::LinkSet(links) = XmlCodec.decode(raw, EntityKind::LinkSet).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(links.root_links.len(), 1);
        assert_eq!(links.missing_links.len(), 2);
        assert!(links.recent_links.is_empty());
    }

    #[test]
    fn test_decode_search_results() {
        let raw = r#"<DataNode ID="Search Results" Label="Search Results: (is contains s1) ">
  <Highlight ID="node:1" Path=".METATRANSCRIPT.Session.Name"/>
  <ChildLink ID="node:1"/>
</DataNode>"#;
        let Entity::SearchResults(results) = XmlCodec.decode(raw, EntityKind::SearchResults).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(results.matched_ids(), vec![&DocumentId::from("node:1")]);
        assert_eq!(
            results.highlighted_paths(&DocumentId::from("node:1")),
            vec![".METATRANSCRIPT.Session.Name"]
        );
    }

    #[test]
    fn test_decode_facet_tree() {
        let raw = "<TreeNode><DisplayString>All</DisplayString>\
                   <TreeNode><DisplayString>Region: North</DisplayString>\
                   <MetadataTreeNode><FileUri>yams-data/CrawledData/n1</FileUri><NodeId>n1</NodeId></MetadataTreeNode>\
                   </TreeNode></TreeNode>";
        let Entity::FacetTree(tree) = XmlCodec.decode(raw, EntityKind::FacetTree).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(tree.display, "All");
        assert_eq!(tree.children[0].display, "Region: North");
        assert_eq!(
            tree.children[0].matches[0].node_id,
            Some(DocumentId::from("n1"))
        );
    }

    #[test]
    fn test_decode_icon_table() {
        let raw = r#"<IconTable>
  <NodeTypeImage><Type Label="Session" Format="imdi"/><Image>iVBORw==</Image></NodeTypeImage>
  <NodeTypeImage><Type Label="Corpus"/><Image>R0lG</Image></NodeTypeImage>
</IconTable>"#;
        let Entity::IconTable(icons) = XmlCodec.decode(raw, EntityKind::IconTable).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(icons.len(), 2);
        assert_eq!(icons.icons[0].node_type.format.as_deref(), Some("imdi"));
        assert_eq!(icons.icon_for_label("Corpus").unwrap().image, "R0lG");
        assert_eq!(
            XmlCodec.decode("", EntityKind::IconTable).unwrap(),
            Entity::IconTable(IconTable::default())
        );
    }

    #[test]
    fn test_decode_stats_list_with_icons() {
        let raw = "<DatabaseList><DatabaseInfo><DatabaseName>yams-data</DatabaseName>\
                   <DatabaseStats><KnownDocuments>2</KnownDocuments></DatabaseStats>\
                   <IconTable><NodeTypeImage><Type Label=\"Session\"/><Image>AA==</Image></NodeTypeImage></IconTable>\
                   </DatabaseInfo><DatabaseInfo><DatabaseName>empty</DatabaseName></DatabaseInfo></DatabaseList>";
        let Entity::DatabaseList(list) = XmlCodec.decode(raw, EntityKind::DatabaseList).unwrap() else {
            panic!("wrong entity kind");
        };
        assert_eq!(list.databases[0].stats.as_ref().unwrap().known_documents, 2);
        assert_eq!(list.databases[0].icons.as_ref().unwrap().len(), 1);
        assert!(list.databases[1].icons.is_none());
    }

    #[test]
    fn test_malformed_input_is_decode_error() {
        let err = XmlCodec
            .decode("<DatabaseStats><KnownDocuments>many</KnownDocuments></DatabaseStats>", EntityKind::DatabaseStats)
            .unwrap_err();
        assert!(matches!(err, Error::Decode { kind: "database stats", .. }));
    }

    #[test]
    fn test_encode_node_keeps_storage_names() {
        let Entity::DocumentNode(node) = XmlCodec.decode(SESSION, EntityKind::DocumentNode).unwrap() else {
            panic!("wrong entity kind");
        };
        let xml = XmlCodec.encode(&Entity::DocumentNode(node.clone())).unwrap();
        assert!(xml.starts_with("<DataNode "));
        assert!(xml.contains(r#"ID="node:1""#));
        assert!(xml.contains(r#"<FieldData Path=".METATRANSCRIPT.Session.Name" FieldValue="s1"/>"#));
        assert_eq!(
            XmlCodec.decode(&xml, EntityKind::DocumentNode).unwrap(),
            Entity::DocumentNode(node)
        );
    }

    #[test]
    fn test_encode_stats_emits_not_cached_marker() {
        let xml = XmlCodec
            .encode(&Entity::DatabaseStats(DatabaseStats::default()))
            .unwrap();
        assert!(xml.contains(crate::query::NOT_CACHED_MARKER));
    }
}
