//! `$expand`: the tree of relations to eager-load.
//!
//! Each path is checked for length before anything is resolved, then its
//! segments are resolved one level at a time against the resource the parent
//! node points at. Shared prefixes share nodes.

use crate::config::Limits;
use crate::error::{LimitKind, QueryError};
use crate::registry::{Registry, Relation, ResourceDescriptor};
use std::collections::BTreeMap;
use std::fmt;

const PARAM: &str = "$expand";

/// One expanded relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionNode {
    name: String,
    path: String,
    relation: Relation,
    table: String,
    primary_key: Vec<String>,
    default_columns: Vec<String>,
    allowed_columns: Vec<String>,
    selected: Vec<String>,
    children: BTreeMap<String, ExpansionNode>,
}

impl ExpansionNode {
    fn new(name: &str, path: String, relation: &Relation, target: &ResourceDescriptor) -> Self {
        let mut default_columns: Vec<String> = target
            .default_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        push_unique(&mut default_columns, relation.related_column());

        Self {
            name: name.to_string(),
            path,
            relation: relation.clone(),
            table: target.table_name().to_string(),
            primary_key: target.primary_key().to_vec(),
            default_columns,
            allowed_columns: target
                .allowed_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            selected: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full `/`-separated path from the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The relation from the parent.
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Name of the resource this node loads.
    pub fn resource(&self) -> &str {
        self.relation.target()
    }

    /// Table this node loads from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Id columns of the loaded resource.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Columns always projected: id columns, belongs-to foreign keys and
    /// the join column back to the parent.
    pub fn default_columns(&self) -> &[String] {
        &self.default_columns
    }

    /// Columns named for this node in `$select`.
    pub fn selected_columns(&self) -> &[String] {
        &self.selected
    }

    /// Nested expansions, by relation name.
    pub fn children(&self) -> &BTreeMap<String, ExpansionNode> {
        &self.children
    }

    /// Columns to load: defaults and child join keys first, then the
    /// selection, or every allowed column when nothing was selected.
    pub fn columns(&self) -> Vec<String> {
        let mut out = self.default_columns.clone();
        for child in self.children.values() {
            push_unique(&mut out, child.relation.owner_column());
        }
        let rest = if self.selected.is_empty() {
            &self.allowed_columns
        } else {
            &self.selected
        };
        for column in rest {
            push_unique(&mut out, column);
        }
        out
    }

    pub(crate) fn select(&mut self, column: &str) {
        push_unique(&mut self.selected, column);
    }

    fn write_eager(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.children.is_empty() {
            f.write_str(".")?;
            write_list(f, &self.children)?;
        }
        Ok(())
    }
}

/// The expansion tree rooted at the requested resource.
///
/// Displays as a nested eager expression:
///
/// ```
/// use restq::{ExpansionTree, Limits, Registry, Relation, ResourceDescriptor};
///
/// let registry = Registry::builder()
///     .resource(ResourceDescriptor::new("customers")
///         .relation("orders", Relation::has_many("orders", "id", "customer_id")))
///     .resource(ResourceDescriptor::new("orders")
///         .properties(["customer_id"])
///         .relation("items", Relation::has_many("items", "id", "order_id"))
///         .relation("customer", Relation::belongs_to("customers", "customer_id", "id")))
///     .resource(ResourceDescriptor::new("items").properties(["order_id"]))
///     .build()
///     .unwrap();
///
/// let paths = ["orders/items".to_string(), "orders/customer".to_string()];
/// let tree = ExpansionTree::build(&registry, "customers", &paths, &Limits::default()).unwrap();
/// assert_eq!(tree.to_string(), "[orders.[customer, items]]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpansionTree {
    children: BTreeMap<String, ExpansionNode>,
}

impl ExpansionTree {
    /// Build from validated `$expand` paths.
    pub fn build(
        registry: &Registry,
        root: &str,
        paths: &[String],
        limits: &Limits,
    ) -> Result<Self, QueryError> {
        if paths.len() > limits.max_relations {
            return Err(QueryError::limit(
                PARAM,
                LimitKind::Relations,
                limits.max_relations,
                paths.len(),
            ));
        }

        let mut split = Vec::with_capacity(paths.len());
        for path in paths {
            let segments: Vec<&str> = path.split('/').map(str::trim).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(QueryError::schema(PARAM, path.as_str(), "empty path segment"));
            }
            if segments.len() > limits.max_recursion_depth {
                return Err(QueryError::limit(
                    PARAM,
                    LimitKind::RecursionDepth,
                    limits.max_recursion_depth,
                    segments.len(),
                ));
            }
            split.push((path.as_str(), segments));
        }

        let root = registry.resolve(PARAM, root, &[] as &[&str])?;
        let mut tree = Self::default();
        let builder = Builder { registry, limits };
        for (path, segments) in split {
            builder.insert(&mut tree.children, root, path, &segments, 0, "")?;
        }
        Ok(tree)
    }

    /// Whether nothing is expanded.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Top-level expansions, by relation name.
    pub fn children(&self) -> &BTreeMap<String, ExpansionNode> {
        &self.children
    }

    /// A node by `/`-separated path.
    pub fn node(&self, path: &str) -> Option<&ExpansionNode> {
        let mut segments = path.split('/');
        let mut node = self.children.get(segments.next()?)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub(crate) fn node_mut(&mut self, path: &str) -> Option<&mut ExpansionNode> {
        let mut segments = path.split('/');
        let mut node = self.children.get_mut(segments.next()?)?;
        for segment in segments {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Join columns the root must project for its top-level expansions.
    pub fn root_join_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for node in self.children.values() {
            let column = node.relation.owner_column();
            if !out.contains(&column) {
                out.push(column);
            }
        }
        out
    }
}

impl fmt::Display for ExpansionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.children)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, nodes: &BTreeMap<String, ExpansionNode>) -> fmt::Result {
    f.write_str("[")?;
    for (i, node) in nodes.values().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        node.write_eager(f)?;
    }
    f.write_str("]")
}

struct Builder<'a> {
    registry: &'a Registry,
    limits: &'a Limits,
}

impl Builder<'_> {
    /// Insert `segments` under `children`, which hang off `parent`.
    fn insert(
        &self,
        children: &mut BTreeMap<String, ExpansionNode>,
        parent: &ResourceDescriptor,
        path: &str,
        segments: &[&str],
        depth: usize,
        prefix: &str,
    ) -> Result<(), QueryError> {
        let Some((&segment, rest)) = segments.split_first() else {
            return Ok(());
        };
        if depth >= self.limits.max_recursion_depth {
            return Err(QueryError::limit(
                PARAM,
                LimitKind::RecursionDepth,
                self.limits.max_recursion_depth,
                depth + 1,
            ));
        }

        let unknown = || QueryError::UnknownRelation {
            param: PARAM.to_string(),
            path: path.to_string(),
            segment: segment.to_string(),
        };
        let relation = parent.allowed_relation(segment).ok_or_else(unknown)?;
        let target = self.registry.get(relation.target()).ok_or_else(unknown)?;

        let node_path = if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{prefix}/{segment}")
        };
        let node = children
            .entry(segment.to_string())
            .or_insert_with(|| ExpansionNode::new(segment, node_path.clone(), relation, target));

        self.insert(&mut node.children, target, path, rest, depth + 1, &node_path)
    }
}

fn push_unique(out: &mut Vec<String>, column: &str) {
    if !out.iter().any(|c| c == column) {
        out.push(column.to_string());
    }
}
