//! Query construction.
//!
//! [`QueryBuilder`] turns typed requests into query-language strings for the
//! document store. It performs no I/O and is deterministic: the same input
//! always yields the same text. Every caller-supplied string is routed
//! through [`escape`] (or [`escape_constructor`] for constructed element
//! content) before it is embedded.
//!
//! # Storage layout
//!
//! | Path | Content |
//! |------|---------|
//! | `CrawledData/{id}` | one `DataNode` per crawled record |
//! | `DatabaseLinks` | the crawler's root/missing/recent link partition |
//! | `DatabaseStats` | cached aggregate counts |
//! | `IconTable` | display icon per record type |
//! | `Facets/{kind}/{type}/{path}[/{value}]` | cached facet aggregates |
//! | `CrawlerStats/{timestamp}` | crawl audit records |

use std::fmt;

use crate::error::{Error, Result};
use crate::escape::{escape, escape_constructor};
use crate::models::{
    DocumentId, FacetType, JoinType, LinkSet, MatchMode, Negator, NodeLink, SearchCriterion,
    SearchRequest,
};

pub const DEFAULT_DATABASE: &str = "yams-data";
pub const TEST_DATABASE: &str = "yams-test-data";
pub const CRAWLED_DATA_COLLECTION: &str = "CrawledData";
pub const FACETS_COLLECTION: &str = "Facets";
pub const STATS_DOCUMENT: &str = "DatabaseStats";
pub const LINKS_DOCUMENT: &str = "DatabaseLinks";
pub const ICON_TABLE_DOCUMENT: &str = "IconTable";
pub const CRAWLER_STATS_COLLECTION: &str = "CrawlerStats";

/// Marker emitted by aggregate queries; the cache flips it on persist.
pub const NOT_CACHED_MARKER: &str = "<Cached>false</Cached>";
pub const CACHED_MARKER: &str = "<Cached>true</Cached>";

/// Record attributes a lookup may key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAttribute {
    Id,
    ArchiveHandle,
    Uri,
}

impl NodeAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeAttribute::Id => "ID",
            NodeAttribute::ArchiveHandle => "ArchiveHandle",
            NodeAttribute::Uri => "URI",
        }
    }
}

/// Aggregate query families, used in cache document names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetQueryKind {
    Types,
    Paths,
    Values,
    Tree,
}

impl fmt::Display for FacetQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FacetQueryKind::Types => "types",
            FacetQueryKind::Paths => "paths",
            FacetQueryKind::Values => "values",
            FacetQueryKind::Tree => "tree",
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// One segment of a document name. `%`, `/` and `=` are percent-encoded
/// so user text can neither add segments nor fake a value suffix.
fn name_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            c => out.push(c),
        }
    }
    out
}

fn name_part(value: &Option<String>) -> String {
    non_empty(value)
        .map(name_segment)
        .unwrap_or_else(|| "all".to_string())
}

/// Cache document name of an aggregate:
/// `Facets/{kind}/{type|all}/{path|all}`, plus `/{value}` when the filter
/// carries a value.
pub fn document_name(kind: FacetQueryKind, filter: Option<&FacetType>) -> String {
    match filter {
        Some(f) => {
            let mut name = format!(
                "{}/{}/{}/{}",
                FACETS_COLLECTION,
                kind,
                name_part(&f.node_type),
                name_part(&f.path)
            );
            if let Some(value) = non_empty(&f.value) {
                name.push('/');
                name.push_str(&name_segment(value));
            }
            name
        }
        None => format!("{}/{}/all/all", FACETS_COLLECTION, kind),
    }
}

/// Cache document name of a multi-facet aggregate, one `{type}/{path}`
/// pair per facet; a facet value is appended to its path as `={value}`.
pub fn tree_document_name(filters: &[FacetType]) -> String {
    let mut name = format!("{}/{}", FACETS_COLLECTION, FacetQueryKind::Tree);
    for f in filters {
        name.push('/');
        name.push_str(&name_part(&f.node_type));
        name.push('/');
        name.push_str(&name_part(&f.path));
        if let Some(value) = non_empty(&f.value) {
            name.push('=');
            name.push_str(&name_segment(value));
        }
    }
    name
}

/// Predicates on a `DataNode` step for a type/path/value filter.
fn node_predicates(filter: Option<&FacetType>) -> String {
    let mut clause = String::new();
    let Some(f) = filter else {
        return clause;
    };
    if let Some(node_type) = non_empty(&f.node_type) {
        clause.push_str(&format!("[Type/@Label = '{}']", escape(node_type)));
    }
    match (non_empty(&f.path), non_empty(&f.value)) {
        (Some(path), Some(value)) => clause.push_str(&format!(
            "[FieldGroup[@Label = '{}'][FieldData/@FieldValue contains text '{}']]",
            escape(path),
            escape(value)
        )),
        (Some(path), None) => {
            clause.push_str(&format!("[FieldGroup/@Label = '{}']", escape(path)));
        }
        (None, Some(value)) => clause.push_str(&format!(
            "[FieldGroup/FieldData/@FieldValue contains text '{}']",
            escape(value)
        )),
        (None, None) => {}
    }
    clause
}

/// Predicates on a `FieldGroup` step for the path/value part of a filter.
fn group_predicates(filter: Option<&FacetType>) -> String {
    let mut clause = String::new();
    let Some(f) = filter else {
        return clause;
    };
    if let Some(path) = non_empty(&f.path) {
        clause.push_str(&format!("[@Label = '{}']", escape(path)));
    }
    if let Some(value) = non_empty(&f.value) {
        clause.push_str(&format!(
            "[FieldData/@FieldValue contains text '{}']",
            escape(value)
        ));
    }
    clause
}

fn type_node(filter: Option<&FacetType>) -> String {
    filter
        .and_then(|f| non_empty(&f.node_type))
        .map(|t| format!("<Type>{}</Type>", escape_constructor(t)))
        .unwrap_or_default()
}

fn path_node(filter: Option<&FacetType>) -> String {
    filter
        .and_then(|f| non_empty(&f.path))
        .map(|p| format!("<Path>{}</Path>", escape_constructor(p)))
        .unwrap_or_default()
}

fn quoted_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|v| format!("'{}'", escape(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Text match on `@FieldValue` for one criterion.
fn text_constraint(mode: MatchMode, text: &str, node_prefix: &str) -> String {
    let text = escape(text);
    match mode {
        MatchMode::Contains => format!("{}@FieldValue contains text '{}'", node_prefix, text),
        MatchMode::Equals => format!("{}@FieldValue = '{}'", node_prefix, text),
        MatchMode::Fuzzy => format!(
            "{}@FieldValue contains text '{}' using fuzzy",
            node_prefix, text
        ),
    }
}

fn link_elements(element: &str, links: &[NodeLink]) -> String {
    let mut out = String::new();
    for link in links {
        out.push('<');
        out.push_str(element);
        out.push_str(&format!(" ID=\"{}\"", escape_constructor(link.id.as_str())));
        if let Some(uri) = &link.uri {
            out.push_str(&format!(" URI=\"{}\"", escape_constructor(uri)));
        }
        out.push_str("/>\n");
    }
    out
}

/// Builds every query the engine sends to the store for one database.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    name: String,
    database: String,
}

impl QueryBuilder {
    pub fn new(database: &str) -> Result<Self> {
        if database.trim().is_empty() {
            return Err(Error::invalid("database name must not be empty"));
        }
        Ok(Self {
            name: database.to_string(),
            database: escape(database),
        })
    }

    /// The database name as given, for executor calls.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The escaped database name embedded in queries.
    pub fn database(&self) -> &str {
        &self.database
    }

    fn collection(&self) -> String {
        format!("collection('{}')", self.database)
    }

    fn nodes(&self) -> String {
        format!(
            "collection('{}/{}')/DataNode",
            self.database, CRAWLED_DATA_COLLECTION
        )
    }

    fn links(&self) -> String {
        format!("{}/{}", self.collection(), LINKS_DOCUMENT)
    }

    // ============ Cache ============

    /// Fetch a stored document by its exact name.
    pub fn cached_document_query(&self, document_name: &str) -> String {
        format!(
            "for $cachedDoc in {}\nwhere document-uri($cachedDoc) = '{}/{}'\nreturn $cachedDoc",
            self.collection(),
            self.database,
            escape(document_name)
        )
    }

    // ============ Aggregates ============

    pub fn database_stats_query(&self) -> String {
        format!(
            "let $nodes := {nodes}\n\
             let $nodeIds := $nodes/@ID/string()\n\
             let $childIds := $nodes/ChildLink/@ID/string()\n\
             let $rootNodes := distinct-values(for $rootId in {links}/RootDocumentLinks/@ID/string() where not($rootId = $childIds) return $rootId)\n\
             return <DatabaseStats>\n\
             <KnownDocuments>{{count($nodes)}}</KnownDocuments>\n\
             <MissingDocuments>{{count({links}/MissingDocumentLinks)}}</MissingDocuments>\n\
             <DuplicateDocuments>{{count($nodeIds) - count(distinct-values($nodeIds))}}</DuplicateDocuments>\n\
             <RootDocuments>{{count($rootNodes)}}</RootDocuments>\n\
             {marker}\n\
             {{for $rootDocId in $rootNodes return <RootDocumentID>{{$rootDocId}}</RootDocumentID>}}\n\
             </DatabaseStats>\n",
            nodes = self.nodes(),
            links = self.links(),
            marker = NOT_CACHED_MARKER,
        )
    }

    pub fn database_list_query(&self) -> String {
        "db:list()".to_string()
    }

    pub fn database_stats_list_query(&self) -> String {
        format!(
            "<DatabaseList>{{\n\
             for $dbName in db:list() return <DatabaseInfo><DatabaseName>{{$dbName}}</DatabaseName>{{\n\
             for $statsDoc in collection($dbName)/{}\n\
             return $statsDoc,\n\
             for $iconDoc in collection($dbName)/{}\n\
             return $iconDoc\n\
             }}</DatabaseInfo>}}</DatabaseList>\n",
            STATS_DOCUMENT, ICON_TABLE_DOCUMENT
        )
    }

    /// The stored icon table; empty when none was inserted yet.
    pub fn node_icons_query(&self) -> String {
        self.cached_document_query(ICON_TABLE_DOCUMENT)
    }

    /// Record types with counts, preceded by an "All Types" total.
    pub fn metadata_types_query(&self, filter: Option<&FacetType>) -> String {
        format!(
            "let $nodes := {}{}\n\
             let $allNodeTypes := $nodes/Type/@Label/string()\n\
             return <MetadataFileType>\n\
             <MetadataFileType><Label>All Types</Label><Count>{{count($nodes)}}</Count></MetadataFileType>\n\
             {{\n\
             for $nodeType in distinct-values($allNodeTypes)\n\
             order by $nodeType\n\
             return <MetadataFileType><Label>{{$nodeType}}</Label><Type>{{$nodeType}}</Type><Count>{{count($allNodeTypes[. = $nodeType])}}</Count></MetadataFileType>\n\
             }}</MetadataFileType>",
            self.nodes(),
            node_predicates(filter)
        )
    }

    /// Field-group labels carrying a value, preceded by an "All Paths" total.
    pub fn metadata_paths_query(&self, filter: Option<&FacetType>) -> String {
        let type_node = type_node(filter);
        format!(
            "let $fieldLabels := {}{}/FieldGroup{}[FieldData/@FieldValue != '']/@Label/string()\n\
             return <MetadataFileType>\n\
             <MetadataFileType><Label>All Paths</Label>{type_node}<Count>{{count($fieldLabels)}}</Count></MetadataFileType>\n\
             {{\n\
             for $label in distinct-values($fieldLabels)\n\
             order by $label\n\
             return <MetadataFileType><Label>{{$label}}</Label>{type_node}<Path>{{$label}}</Path><Count>{{count($fieldLabels[. = $label])}}</Count></MetadataFileType>\n\
             }}</MetadataFileType>",
            self.nodes(),
            node_predicates(filter),
            group_predicates(filter),
        )
    }

    /// Up to `max_results` distinct field values, sorted.
    pub fn field_values_query(&self, filter: Option<&FacetType>, max_results: usize) -> Result<String> {
        if max_results == 0 {
            return Err(Error::invalid("max_results must be at least 1"));
        }
        Ok(format!(
            "let $fieldValues := {}{}/FieldGroup{}/FieldData/@FieldValue/string()\n\
             return <MetadataFileType>\n\
             {{\n\
             for $label in distinct-values($fieldValues)[position() le {}]\n\
             order by $label\n\
             return <MetadataFileType><Label>{{$label}}</Label><Value>{{$label}}</Value>{}{}</MetadataFileType>\n\
             }}</MetadataFileType>",
            self.nodes(),
            node_predicates(filter),
            group_predicates(filter),
            max_results,
            type_node(filter),
            path_node(filter),
        ))
    }

    /// Value counts of the last facet among records matching every facet.
    pub fn tree_facets_query(&self, filters: &[FacetType]) -> Result<String> {
        let Some(last) = filters.last() else {
            return Err(Error::invalid("at least one facet is required"));
        };
        let scope: String = filters.iter().map(|f| node_predicates(Some(f))).collect();
        Ok(format!(
            "let $fieldValues := {}{}/FieldGroup{}/FieldData/@FieldValue/string()\n\
             return <MetadataFileType>\n\
             {{\n\
             for $label in distinct-values($fieldValues)\n\
             order by $label\n\
             return <MetadataFileType><Label>{{$label}}</Label><Value>{{$label}}</Value>{}{}<Count>{{count($fieldValues[. = $label])}}</Count></MetadataFileType>\n\
             }}</MetadataFileType>",
            self.nodes(),
            scope,
            group_predicates(Some(last)),
            type_node(Some(last)),
            path_node(Some(last)),
        ))
    }

    /// The nested browse tree over `field_labels`, one level per label.
    pub fn facet_tree_query(&self, type_filter: Option<&FacetType>, field_labels: &[String]) -> Result<String> {
        if field_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::invalid("facet labels must not be empty"));
        }
        let scope = format!("{}{}", self.nodes(), node_predicates(type_filter));
        Ok(format!(
            "<TreeNode><DisplayString>All</DisplayString>\n{}</TreeNode>",
            self.facet_children_query(&scope, field_labels, 0)
        ))
    }

    /// One level of the browse tree.
    ///
    /// `scope` is the record path with every ancestor selection applied.
    /// Distinct values of the first label are listed in lexicographic order
    /// and each recurses with its own selection added; with no labels left
    /// the matching records themselves are enumerated.
    pub fn facet_children_query(&self, scope: &str, field_labels: &[String], level: usize) -> String {
        match field_labels.split_first() {
            Some((label, rest)) => {
                let variable = format!("$facetValue{}", level);
                let escaped = escape(label);
                let next_scope = format!(
                    "{}[FieldGroup[@Label = '{}']/FieldData/@FieldValue = {}]",
                    scope, escaped, variable
                );
                format!(
                    "{{\nfor {var} in distinct-values({scope}/FieldGroup[@Label = '{label}']/FieldData/@FieldValue/string())\n\
                     order by {var}\n\
                     return\n\
                     <TreeNode><DisplayString>{display}: {{{var}}}</DisplayString>\n\
                     {children}</TreeNode>\n}}\n",
                    var = variable,
                    scope = scope,
                    label = escaped,
                    display = escape_constructor(label),
                    children = self.facet_children_query(&next_scope, rest, level + 1),
                )
            }
            None => format!(
                "{{\nfor $matchingNode in {}\n\
                 return\n\
                 <MetadataTreeNode><FileUri>{{base-uri($matchingNode)}}</FileUri><NodeId>{{string($matchingNode/@ID)}}</NodeId></MetadataTreeNode>\n}}\n",
                scope
            ),
        }
    }

    // ============ Record lookups ============

    /// Stored roots that have not since turned out to be someone's child.
    pub fn root_nodes_query(&self) -> String {
        format!(
            "let $childIds := {nodes}/ChildLink/@ID/string()\n\
             return <DataNode>{{\n\
             for $rootId in distinct-values({links}/RootDocumentLinks/@ID/string())\n\
             where not($rootId = $childIds)\n\
             return {nodes}[@ID eq $rootId]\n\
             }}</DataNode>",
            nodes = self.nodes(),
            links = self.links(),
        )
    }

    /// Children of a record in declaration order, sliced to `(start, end]`.
    pub fn child_nodes_query(
        &self,
        attribute: NodeAttribute,
        value: &str,
        start: usize,
        end: usize,
    ) -> Result<String> {
        if end < start {
            return Err(Error::invalid(format!(
                "page end {} is before page start {}",
                end, start
            )));
        }
        Ok(format!(
            "<DataNode>{{for $childNodeId in {nodes}[@{attr} eq '{value}']/ChildLink[position() gt {start} and position() le {end}]/@ID\n\
             return {nodes}[@ID eq $childNodeId]}}</DataNode>",
            nodes = self.nodes(),
            attr = attribute.as_str(),
            value = escape(value),
            start = start,
            end = end,
        ))
    }

    /// Every record whose attribute is one of `values`, in store order.
    pub fn nodes_by_attribute_query<'a>(
        &self,
        attribute: NodeAttribute,
        values: impl IntoIterator<Item = &'a str>,
    ) -> String {
        format!(
            "<DataNode>\n{{for $dataNode in {} where $dataNode/@{} = (\n{}) return $dataNode}}</DataNode>",
            self.nodes(),
            attribute.as_str(),
            quoted_list(values)
        )
    }

    pub fn existing_document_query(&self, id: &DocumentId) -> String {
        format!(
            "let $countValue := count({}[@ID = '{}'])\nreturn $countValue",
            self.nodes(),
            escape(id.as_str())
        )
    }

    pub fn node_document_name(id: &DocumentId) -> String {
        format!("{}/{}", CRAWLED_DATA_COLLECTION, id)
    }

    // ============ Search ============

    /// Candidate set for one criterion: `Highlight` elements for `is`,
    /// `Exclude` elements for `not`.
    fn criterion_set_query(&self, criterion: &SearchCriterion) -> String {
        let mut type_clause = String::new();
        if let Some(node_type) = non_empty(&criterion.file_type.node_type) {
            type_clause.push_str(&format!("[Type/@Label = '{}']", escape(node_type)));
        }
        let mut path_clause = String::new();
        if let Some(path) = non_empty(&criterion.file_type.path) {
            path_clause.push_str(&format!("[@Label = '{}']", escape(path)));
        }
        // A blank `contains` selects its whole scope, field group or not,
        // so it can still be negated.
        if criterion.match_mode == MatchMode::Contains && criterion.text.is_empty() {
            let group_clause = if path_clause.is_empty() {
                String::new()
            } else {
                format!("[FieldGroup{}]", path_clause)
            };
            let element = match criterion.negator {
                Negator::Is => "Highlight",
                Negator::Not => "Exclude",
            };
            return format!(
                "for $foundNode in {}{}{}\nreturn <{element}>{{$foundNode/@ID}}</{element}>\n",
                self.nodes(),
                type_clause,
                group_clause,
                element = element
            );
        }
        let fields = match criterion.negator {
            Negator::Is => format!(
                "for $field in $foundNode/FieldGroup{}/FieldData[{}]\n\
                 return\n\
                 <Highlight>{{$nodeId, $field/@Path}}</Highlight>\n",
                path_clause,
                text_constraint(criterion.match_mode, &criterion.text, "")
            ),
            Negator::Not => "<Exclude>{$nodeId}</Exclude>\n".to_string(),
        };
        format!(
            "for $foundNode in {}{}[FieldGroup{}[{}]]\n\
             let $nodeId := $foundNode/@ID\n\
             return\n\
             (\n{})\n",
            self.nodes(),
            type_clause,
            path_clause,
            text_constraint(criterion.match_mode, &criterion.text, "FieldData/"),
            fields
        )
    }

    fn search_label(request: &SearchRequest) -> String {
        let mut label = String::from("Search Results: ");
        if request.criteria.len() > 1 {
            label.push_str(&request.join.to_string());
            label.push(' ');
        }
        for criterion in &request.criteria {
            label.push('(');
            if let Some(node_type) = non_empty(&criterion.file_type.node_type) {
                label.push_str(&escape_constructor(node_type));
                label.push(' ');
            }
            if let Some(path) = non_empty(&criterion.file_type.path) {
                label.push_str(&escape_constructor(path));
                label.push(' ');
            }
            label.push_str(&format!(
                "{} {} {}) ",
                criterion.negator,
                criterion.match_mode,
                escape_constructor(&criterion.text)
            ));
        }
        label
    }

    /// Multi-criterion search.
    ///
    /// `is` sets are joined per the request's join type, the union of all
    /// `not` sets is subtracted, and the survivors are returned as
    /// `Highlight` markers followed by one `ChildLink` per distinct id.
    /// With no `is` criterion at all, every record is the starting set.
    pub fn search_query(&self, request: &SearchRequest) -> Result<String> {
        if request.criteria.is_empty() {
            return Err(Error::invalid("a search needs at least one criterion"));
        }
        let mut query = format!(
            "<DataNode ID=\"Search Results\" Label=\"{}\">{{\n",
            Self::search_label(request)
        );
        let mut document_sets = 0;
        let mut exclusion_sets = 0;
        for criterion in &request.criteria {
            match criterion.negator {
                Negator::Is => {
                    query.push_str(&format!("let $documentSet{}", document_sets));
                    document_sets += 1;
                }
                Negator::Not => {
                    query.push_str(&format!("let $exclusionSet{}", exclusion_sets));
                    exclusion_sets += 1;
                }
            }
            query.push_str(" := ");
            query.push_str(&self.criterion_set_query(criterion));
        }
        if document_sets == 0 {
            query.push_str(&format!(
                "let $documentSet0 := for $foundNode in {} return <Highlight>{{$foundNode/@ID}}</Highlight>\n",
                self.nodes()
            ));
            document_sets = 1;
        }

        query.push_str("let $highlightSet := $documentSet0");
        for set in 1..document_sets {
            match request.join {
                JoinType::Intersect => {
                    query.push_str(&format!("[@ID = $documentSet{}/@ID]", set));
                }
                JoinType::Union => {
                    query.push_str(&format!(" union $documentSet{}", set));
                }
            }
        }
        query.push_str("\nlet $exclusionSet := (()");
        for set in 0..exclusion_sets {
            query.push_str(&format!(",$exclusionSet{}", set));
        }
        query.push_str(")\n");
        query.push_str(
            "let $survivors := $highlightSet[not(@ID = $exclusionSet/@ID)]\n\
             let $nodeIdSet := for $nodeId in distinct-values($survivors/@ID) return <ChildLink ID='{$nodeId}'/>\n\
             return\n\
             ($survivors, $nodeIdSet)\n\
             }</DataNode>\n",
        );
        Ok(query)
    }

    // ============ Branch deletion ============

    /// Recursive closure function with a visited guard against cyclic links.
    fn branch_function(&self) -> String {
        format!(
            "declare function local:branch($nodeId as xs:string, $visited as xs:string*) as xs:string*\n\
             {{\n\
             if ($nodeId = $visited) then ()\n\
             else\n\
             for $node in {}[@ID eq $nodeId]\n\
             return (\n\
             for $childId in $node/ChildLink/@ID/string()\n\
             return local:branch($childId, ($visited, $nodeId)),\n\
             $nodeId\n\
             )\n\
             }};\n",
            self.nodes()
        )
    }

    /// Size of the stored closure under `root`, `root` included.
    pub fn branch_closure_count_query(&self, root: &DocumentId) -> String {
        format!(
            "{}count(distinct-values(local:branch('{}', ())))",
            self.branch_function(),
            escape(root.as_str())
        )
    }

    /// Store-side recursive branch delete.
    ///
    /// Closure ids found in `RecentDocumentLinks` are renamed to
    /// `MissingDocumentLinks` and the closure's records are deleted, all in
    /// one update.
    pub fn branch_delete_query(&self, root: &DocumentId) -> String {
        format!(
            "{}let $deleteList := distinct-values(local:branch('{}', ()))\n\
             return (\n\
             for $recent in {links}/RecentDocumentLinks[@ID = $deleteList]\n\
             return rename node $recent as 'MissingDocumentLinks',\n\
             delete node {nodes}[@ID = $deleteList]\n\
             )\n",
            self.branch_function(),
            escape(root.as_str()),
            links = self.links(),
            nodes = self.nodes(),
        )
    }

    /// The stored records among `ids` with their child ids, for one
    /// breadth-first step of a client-side traversal.
    pub fn branch_level_query(&self, ids: &[DocumentId]) -> String {
        format!(
            "<BranchLevel>{{\n\
             for $node in {}[@ID = ({})]\n\
             return <Node ID='{{$node/@ID}}'>{{for $childId in $node/ChildLink/@ID return <Child ID='{{$childId}}'/>}}</Node>\n\
             }}</BranchLevel>",
            self.nodes(),
            quoted_list(ids.iter().map(|id| id.as_str()))
        )
    }

    /// Delete an explicit id list, moving recent links to missing first.
    pub fn delete_nodes_query(&self, ids: &[DocumentId]) -> String {
        format!(
            "let $deleteList := ({})\n\
             return (\n\
             for $recent in {}/RecentDocumentLinks[@ID = $deleteList]\n\
             return rename node $recent as 'MissingDocumentLinks',\n\
             delete node {}[@ID = $deleteList]\n\
             )\n",
            quoted_list(ids.iter().map(|id| id.as_str())),
            self.links(),
            self.nodes()
        )
    }

    // ============ Link state ============

    /// Evaluates to `1` when the link document exists and `0` otherwise.
    pub fn links_exist_query(&self) -> String {
        format!("if (fn:empty({})) then (0) else (1)", self.links())
    }

    pub fn empty_links_document() -> String {
        format!("<{}/>", LINKS_DOCUMENT)
    }

    /// Merge a crawler batch into the stored link partition in one update.
    ///
    /// Stored roots that have since become a child of a stored record are
    /// dropped. All conditions are evaluated against the pre-update
    /// snapshot, so the batch must already be free of repeats (see
    /// [`LinkSet::normalized`]).
    pub fn merge_links_query(&self, batch: &LinkSet) -> String {
        let mut updated = format!("<{}>\n", LINKS_DOCUMENT);
        updated.push_str(&link_elements("RootDocumentLinks", &batch.root_links));
        updated.push_str(&link_elements("MissingDocumentLinks", &batch.missing_links));
        updated.push_str(&link_elements("RecentDocumentLinks", &batch.recent_links));
        updated.push_str(&format!("</{}>", LINKS_DOCUMENT));
        format!(
            "let $updatedLinks := {updated}\n\
             let $storedLinks := {links}\n\
             let $childIds := {nodes}/ChildLink/@ID\n\
             let $knownIds := {nodes}/@ID\n\
             return (\n\
             delete node $storedLinks/MissingDocumentLinks[@ID = $updatedLinks/RecentDocumentLinks/@ID],\n\
             delete node $storedLinks/RootDocumentLinks[@ID = $childIds],\n\
             insert node $updatedLinks/RootDocumentLinks[not(@ID = $storedLinks/RootDocumentLinks/@ID)][not(@ID = $storedLinks/MissingDocumentLinks/@ID)][not(@ID = $storedLinks/RecentDocumentLinks/@ID)][not(@ID = $childIds)] into $storedLinks,\n\
             insert node $updatedLinks/MissingDocumentLinks[not(@ID = $storedLinks/MissingDocumentLinks/@ID)][not(@ID = $storedLinks/RecentDocumentLinks/@ID)][not(@ID = $storedLinks/RootDocumentLinks/@ID)][not(@ID = $knownIds)] into $storedLinks,\n\
             insert node $updatedLinks/RecentDocumentLinks[not(@ID = $storedLinks/RecentDocumentLinks/@ID)][not(@ID = $storedLinks/RootDocumentLinks/@ID)] into $storedLinks\n\
             )",
            updated = updated,
            links = self.links(),
            nodes = self.nodes(),
        )
    }

    /// Up to `limit` missing links, optionally restricted by URI text.
    pub fn next_missing_query(&self, limit: usize, uri_filter: Option<&str>) -> Result<String> {
        if limit == 0 {
            return Err(Error::invalid("limit must be at least 1"));
        }
        let filter = uri_filter
            .filter(|f| !f.is_empty())
            .map(|f| format!("[@URI contains text '{}']", escape(f)))
            .unwrap_or_default();
        Ok(format!(
            "<{doc}>{{{links}/MissingDocumentLinks{filter}[position() le {limit}]}}</{doc}>",
            doc = LINKS_DOCUMENT,
            links = self.links(),
            filter = filter,
            limit = limit,
        ))
    }

    pub fn link_counts_query(&self) -> String {
        format!(
            "count({links}/MissingDocumentLinks),\n\
             count({links}/RecentDocumentLinks),\n\
             count({nodes})\n",
            links = self.links(),
            nodes = self.nodes(),
        )
    }

    /// A crawl audit record; the timestamp is also the document name suffix.
    pub fn crawler_stats_query(&self, query_ms: u64, link_batch: usize, timestamp: &str) -> String {
        format!(
            "let $childIds := {nodes}/ChildLink\n\
             let $knownIds := {nodes}/@ID\n\
             return\n\
             <CrawlerStats linkcount='{{count($childIds)}}' documentcount='{{count($knownIds)}}' queryms='{query_ms}' batchsize='{link_batch}' timestamp='{timestamp}'/>",
            nodes = self.nodes(),
            query_ms = query_ms,
            link_batch = link_batch,
            timestamp = escape_constructor(timestamp),
        )
    }
}
